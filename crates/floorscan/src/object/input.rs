//! Payloads for creating objects and for ingesting AI detections.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{FloorscanError, Result};
use crate::geometry::Geometry;

use super::ids::{ObjectId, PlanId, TenantId};
use super::model::{Criticality, InfraObject, ObjectSource};
use super::properties::ObjectProperties;

/// A manually created (or imported/templated/duplicated) object.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewObject {
    pub plan_id: PlanId,
    pub category: String,
    #[serde(rename = "type")]
    pub object_type: String,
    #[serde(default)]
    pub subtype: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    pub geometry: Geometry,
    #[serde(default)]
    pub properties: ObjectProperties,
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub criticality: Criticality,
    #[serde(default = "default_manual_source")]
    pub source: ObjectSource,
    #[serde(default)]
    pub parent_object_id: Option<ObjectId>,
}

fn default_manual_source() -> ObjectSource {
    ObjectSource::ManualCreation
}

impl NewObject {
    pub fn new(
        plan_id: impl Into<PlanId>,
        category: impl Into<String>,
        object_type: impl Into<String>,
        geometry: Geometry,
    ) -> Self {
        Self {
            plan_id: plan_id.into(),
            category: category.into(),
            object_type: object_type.into(),
            subtype: None,
            name: None,
            description: None,
            geometry,
            properties: ObjectProperties::default(),
            confidence: None,
            criticality: Criticality::None,
            source: ObjectSource::ManualCreation,
            parent_object_id: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_subtype(mut self, subtype: impl Into<String>) -> Self {
        self.subtype = Some(subtype.into());
        self
    }

    pub fn with_properties(mut self, properties: ObjectProperties) -> Self {
        self.properties = properties;
        self
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = Some(confidence);
        self
    }

    pub fn with_criticality(mut self, criticality: Criticality) -> Self {
        self.criticality = criticality;
        self
    }

    pub fn with_source(mut self, source: ObjectSource) -> Self {
        self.source = source;
        self
    }

    pub fn with_parent(mut self, parent: impl Into<ObjectId>) -> Self {
        self.parent_object_id = Some(parent.into());
        self
    }

    /// Build the stored record. Status and review flags are settled by the
    /// caller once the review policy is known.
    pub(crate) fn into_object(
        self,
        tenant_id: TenantId,
        actor: &str,
        now: DateTime<Utc>,
    ) -> Result<InfraObject> {
        validate_payload(&self.geometry, self.confidence)?;
        self.properties.validate(&self.category, &self.object_type)?;

        Ok(InfraObject {
            id: ObjectId::generate(),
            tenant_id,
            plan_id: self.plan_id,
            ai_job_id: None,
            name: self.name,
            description: self.description,
            category: self.category,
            object_type: self.object_type,
            subtype: self.subtype,
            geometry: Some(self.geometry),
            properties: self.properties,
            confidence: self.confidence,
            criticality: self.criticality,
            status: self.source.initial_status(),
            source: self.source,
            requires_review: false,
            manually_validated: false,
            validated_at: None,
            validated_by: None,
            parent_object_id: self.parent_object_id,
            related_object_ids: BTreeSet::new(),
            conflicts: Vec::new(),
            annotations: Vec::new(),
            modification_history: Vec::new(),
            compliance_checks: Vec::new(),
            created_by: actor.to_string(),
            last_modified_by: actor.to_string(),
            created_at: now,
            updated_at: now,
            is_active: true,
            is_deleted: false,
            revision: 0,
        })
    }
}

/// One detection reported by the AI pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Detection {
    pub plan_id: PlanId,
    #[serde(default)]
    pub ai_job_id: Option<String>,
    pub category: String,
    #[serde(rename = "type")]
    pub object_type: String,
    #[serde(default)]
    pub subtype: Option<String>,
    pub geometry: Geometry,
    pub confidence: f64,
    #[serde(default)]
    pub criticality: Criticality,
    /// Model-specific metadata, stored under the `detection` property.
    #[serde(default)]
    pub metadata: IndexMap<String, Value>,
}

impl Detection {
    pub fn new(
        plan_id: impl Into<PlanId>,
        category: impl Into<String>,
        object_type: impl Into<String>,
        geometry: Geometry,
        confidence: f64,
    ) -> Self {
        Self {
            plan_id: plan_id.into(),
            ai_job_id: None,
            category: category.into(),
            object_type: object_type.into(),
            subtype: None,
            geometry,
            confidence,
            criticality: Criticality::None,
            metadata: IndexMap::new(),
        }
    }

    pub fn with_job(mut self, job_id: impl Into<String>) -> Self {
        self.ai_job_id = Some(job_id.into());
        self
    }

    pub fn with_criticality(mut self, criticality: Criticality) -> Self {
        self.criticality = criticality;
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub(crate) fn metadata_value(&self) -> Option<Value> {
        (!self.metadata.is_empty()).then(|| {
            Value::Object(
                self.metadata
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect(),
            )
        })
    }

    pub(crate) fn into_object(
        self,
        tenant_id: TenantId,
        actor: &str,
        now: DateTime<Utc>,
    ) -> Result<InfraObject> {
        let mut properties = ObjectProperties::default();
        if let Some(metadata) = self.metadata_value() {
            properties.extra.insert("detection".to_string(), metadata);
        }

        let ai_job_id = self.ai_job_id.clone();
        let mut new = NewObject::new(self.plan_id, self.category, self.object_type, self.geometry)
            .with_confidence(self.confidence)
            .with_criticality(self.criticality)
            .with_source(ObjectSource::AiDetection)
            .with_properties(properties);
        new.subtype = self.subtype;

        let mut object = new.into_object(tenant_id, actor, now)?;
        object.ai_job_id = ai_job_id;
        Ok(object)
    }
}

/// Reject geometry or confidence values that could never be scanned.
pub(crate) fn validate_payload(geometry: &Geometry, confidence: Option<f64>) -> Result<()> {
    geometry.validate().map_err(FloorscanError::Validation)?;
    if let Some(c) = confidence {
        if !c.is_finite() || !(0.0..=1.0).contains(&c) {
            return Err(FloorscanError::Validation(format!(
                "confidence {} is outside [0, 1]",
                c
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::BoundingBox;
    use crate::object::ObjectStatus;

    fn geom() -> Geometry {
        Geometry::from_bbox(BoundingBox::new(0.0, 0.0, 10.0, 10.0))
    }

    #[test]
    fn test_detection_becomes_ai_object() {
        let detection = Detection::new("plan-1", "safety", "fire_extinguisher", geom(), 0.91)
            .with_job("job-7")
            .with_metadata("model", "yolo-v8");
        let obj = detection
            .into_object(TenantId::from("t1"), "system:ai", Utc::now())
            .unwrap();

        assert_eq!(obj.source, ObjectSource::AiDetection);
        assert_eq!(obj.status, ObjectStatus::Detected);
        assert_eq!(obj.ai_job_id.as_deref(), Some("job-7"));
        assert_eq!(obj.properties.extra["detection"]["model"], "yolo-v8");
        assert!(obj.is_listed());
    }

    #[test]
    fn test_rejects_out_of_range_confidence() {
        let new = NewObject::new("plan-1", "access", "door", geom()).with_confidence(1.5);
        let err = new
            .into_object(TenantId::from("t1"), "user:a", Utc::now())
            .unwrap_err();
        assert!(matches!(err, FloorscanError::Validation(_)));
    }

    #[test]
    fn test_rejects_negative_extent() {
        let bad = Geometry::from_bbox(BoundingBox::new(0.0, 0.0, -5.0, 10.0));
        let new = NewObject::new("plan-1", "access", "door", bad);
        assert!(new.into_object(TenantId::from("t1"), "user:a", Utc::now()).is_err());
    }
}
