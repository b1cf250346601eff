//! Run-time construction of the AWS clients.
//!
//! A [`ClientFactory`] is built once per command from the configuration and
//! the environment credentials, and hands out one client per service. The
//! core workflow only sees them as trait objects through
//! [`CloudServices`].

use std::time::Duration;

use anyhow::{Context, Result};

use kb_sync_core::retry::RetryPolicy;
use kb_sync_core::workflow::CloudServices;

use crate::aws::aoss::AossClient;
use crate::aws::bedrock::{BedrockAgentClient, BedrockRuntimeClient};
use crate::aws::opensearch::OpenSearchClient;
use crate::aws::sigv4::Signer;
use crate::aws::sts::StsClient;
use crate::aws::{endpoint, Credentials, ServiceClient};
use crate::config::{AwsConfig, Config};

pub struct ClientFactory {
    aws: AwsConfig,
    credentials: Credentials,
    http: reqwest::Client,
    retry: RetryPolicy,
}

impl ClientFactory {
    /// Read credentials from the environment and build the shared HTTP
    /// client.
    pub fn from_config(config: &Config) -> Result<Self> {
        let credentials = Credentials::from_env()?;
        Self::with_credentials(config, credentials)
    }

    pub fn with_credentials(config: &Config, credentials: Credentials) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.aws.timeout_secs))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            aws: config.aws.clone(),
            credentials,
            http,
            retry: config.retry.policy(),
        })
    }

    fn service(&self, signing_name: &'static str, label: &'static str) -> ServiceClient {
        let signer = Signer::new(self.credentials.clone(), &self.aws.region, signing_name);
        ServiceClient::new(self.http.clone(), signer, label)
    }

    pub fn sts(&self) -> StsClient {
        StsClient::new(
            self.service("sts", "sts"),
            endpoint(self.aws.sts_endpoint.as_deref(), "sts", &self.aws.region),
            self.retry.clone(),
        )
    }

    pub fn collections(&self) -> AossClient {
        AossClient::new(
            self.service("aoss", "aoss"),
            endpoint(self.aws.aoss_endpoint.as_deref(), "aoss", &self.aws.region),
        )
    }

    pub fn indexes(&self) -> OpenSearchClient {
        let signer = Signer::new(self.credentials.clone(), &self.aws.region, "aoss")
            .with_content_sha256();
        OpenSearchClient::new(ServiceClient::new(self.http.clone(), signer, "opensearch"))
    }

    pub fn knowledge_bases(&self) -> BedrockAgentClient {
        BedrockAgentClient::new(
            self.service("bedrock", "bedrock-agent"),
            endpoint(
                self.aws.bedrock_agent_endpoint.as_deref(),
                "bedrock-agent",
                &self.aws.region,
            ),
        )
    }

    pub fn retrieval(&self) -> BedrockRuntimeClient {
        BedrockRuntimeClient::new(
            self.service("bedrock", "bedrock-agent-runtime"),
            endpoint(
                self.aws.bedrock_runtime_endpoint.as_deref(),
                "bedrock-agent-runtime",
                &self.aws.region,
            ),
        )
    }

    /// Every workflow client, owned together.
    pub fn workflow_clients(&self) -> AwsClients {
        AwsClients {
            sts: self.sts(),
            collections: self.collections(),
            indexes: self.indexes(),
            knowledge_bases: self.knowledge_bases(),
        }
    }
}

/// Owned clients backing one [`CloudServices`].
pub struct AwsClients {
    pub sts: StsClient,
    pub collections: AossClient,
    pub indexes: OpenSearchClient,
    pub knowledge_bases: BedrockAgentClient,
}

impl AwsClients {
    pub fn services(&self) -> CloudServices<'_> {
        CloudServices {
            identity: &self.sts,
            collections: &self.collections,
            indexes: &self.indexes,
            knowledge_bases: &self.knowledge_bases,
        }
    }
}
