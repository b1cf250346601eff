//! STS `GetCallerIdentity`.

use async_trait::async_trait;
use reqwest::Method;

use kb_sync_core::cloud::IdentityApi;
use kb_sync_core::error::{ApiError, ErrorKind};
use kb_sync_core::models::CallerIdentity;
use kb_sync_core::retry::RetryPolicy;

use super::{extract_xml_value, ServiceClient};

const SERVICE: &str = "sts";
const BODY: &str = "Action=GetCallerIdentity&Version=2011-06-15";

pub struct StsClient {
    client: ServiceClient,
    endpoint: String,
    retry: RetryPolicy,
}

impl StsClient {
    pub fn new(client: ServiceClient, endpoint: String, retry: RetryPolicy) -> Self {
        Self {
            client,
            endpoint,
            retry,
        }
    }

    async fn get_caller_identity(&self) -> Result<CallerIdentity, ApiError> {
        let url = format!("{}/", self.endpoint);
        let xml = self
            .client
            .send(
                "GetCallerIdentity",
                Method::POST,
                &url,
                &[("content-type", "application/x-www-form-urlencoded; charset=utf-8")],
                BODY.as_bytes().to_vec(),
            )
            .await?;
        parse_caller_identity(&xml)
    }
}

#[async_trait]
impl IdentityApi for StsClient {
    async fn caller_identity(&self) -> Result<CallerIdentity, ApiError> {
        self.retry
            .run("GetCallerIdentity", |_| self.get_caller_identity())
            .await
    }
}

fn parse_caller_identity(xml: &str) -> Result<CallerIdentity, ApiError> {
    let field = |tag: &str| {
        extract_xml_value(xml, tag).ok_or_else(|| {
            ApiError::new(
                SERVICE,
                "GetCallerIdentity",
                ErrorKind::Other,
                format!("response is missing <{}>", tag),
            )
        })
    };
    Ok(CallerIdentity {
        account: field("Account")?,
        arn: field("Arn")?,
        user_id: field("UserId")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_identity_response() {
        let xml = r#"<GetCallerIdentityResponse xmlns="https://sts.amazonaws.com/doc/2011-06-15/">
  <GetCallerIdentityResult>
    <Arn>arn:aws:iam::123456789012:user/ops</Arn>
    <UserId>AIDAEXAMPLE</UserId>
    <Account>123456789012</Account>
  </GetCallerIdentityResult>
  <ResponseMetadata><RequestId>01234567-89ab</RequestId></ResponseMetadata>
</GetCallerIdentityResponse>"#;
        let id = parse_caller_identity(xml).unwrap();
        assert_eq!(id.account, "123456789012");
        assert_eq!(id.arn, "arn:aws:iam::123456789012:user/ops");
        assert_eq!(id.user_id, "AIDAEXAMPLE");
    }

    #[test]
    fn missing_field_is_an_error() {
        let err = parse_caller_identity("<GetCallerIdentityResult/>").unwrap_err();
        assert!(err.message.contains("Account"));
    }
}
