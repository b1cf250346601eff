//! Deterministic resource names.
//!
//! Every remote resource the workflow touches is named from a single
//! deployment suffix, so a rerun with the same suffix finds the resources a
//! previous run created.

use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResourceNames {
    pub suffix: String,
    pub vector_store: String,
    pub index: String,
    pub knowledge_base: String,
    pub data_source: String,
    pub encryption_policy: String,
    pub network_policy: String,
    pub access_policy: String,
    pub execution_role: String,
    pub foundation_model_policy: String,
    pub s3_policy: String,
    pub secret_policy: String,
    pub oss_policy: String,
}

impl ResourceNames {
    pub fn from_suffix(suffix: &str) -> Self {
        let kb = format!("bedrock-sample-knowledge-base-{}", suffix);
        Self {
            suffix: suffix.to_string(),
            vector_store: format!("bedrock-vectordb-rag-{}", suffix),
            index: format!("bedrock-vectordb-rag-index-{}", suffix),
            knowledge_base: kb.clone(),
            data_source: kb,
            encryption_policy: format!("bedrock-sample-rag-sp-{}", suffix),
            network_policy: format!("bedrock-sample-rag-np-{}", suffix),
            access_policy: format!("bedrock-sample-rag-ap-{}", suffix),
            execution_role: format!("AmazonBedrockExecutionRoleForKnowledgeBase_{}", suffix),
            foundation_model_policy: format!(
                "AmazonBedrockFoundationModelPolicyForKnowledgeBase_{}",
                suffix
            ),
            s3_policy: format!("AmazonBedrockS3PolicyForKnowledgeBase_{}", suffix),
            secret_policy: format!("AmazonBedrockSecretPolicyForKnowledgeBase_{}", suffix),
            oss_policy: format!("AmazonBedrockOSSPolicyForKnowledgeBase_{}", suffix),
        }
    }

    /// `(label, name)` pairs in display order.
    pub fn entries(&self) -> Vec<(&'static str, &str)> {
        vec![
            ("vector_store", self.vector_store.as_str()),
            ("index", self.index.as_str()),
            ("knowledge_base", self.knowledge_base.as_str()),
            ("data_source", self.data_source.as_str()),
            ("encryption_policy", self.encryption_policy.as_str()),
            ("network_policy", self.network_policy.as_str()),
            ("access_policy", self.access_policy.as_str()),
            ("execution_role", self.execution_role.as_str()),
            ("foundation_model_policy", self.foundation_model_policy.as_str()),
            ("s3_policy", self.s3_policy.as_str()),
            ("secret_policy", self.secret_policy.as_str()),
            ("oss_policy", self.oss_policy.as_str()),
        ]
    }
}

/// Check a collection name against the service naming rules:
/// 3-32 characters, lowercase letters, digits and hyphens, starting with a
/// lowercase letter.
pub fn validate_collection_name(name: &str) -> Result<(), String> {
    if !(3..=32).contains(&name.len()) {
        return Err(format!(
            "collection name '{}' must be 3-32 characters (got {})",
            name,
            name.len()
        ));
    }
    if !name.starts_with(|c: char| c.is_ascii_lowercase()) {
        return Err(format!(
            "collection name '{}' must start with a lowercase letter",
            name
        ));
    }
    if let Some(bad) = name
        .chars()
        .find(|c| !(c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '-'))
    {
        return Err(format!(
            "collection name '{}' contains invalid character '{}'",
            name, bad
        ));
    }
    Ok(())
}
