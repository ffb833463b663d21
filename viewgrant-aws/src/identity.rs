//! Caller identity and role policy gateway (STS + IAM).

use async_trait::async_trait;
use aws_types::SdkConfig;
use once_cell::sync::Lazy;
use regex::Regex;
use viewgrant_core::GatewayError;
use viewgrant_gateway::{GatewayResult, IdentityGateway};

use crate::sdk_error;

/// `arn:<partition>:sts::<account>:assumed-role/<role>/<session>`
static ASSUMED_ROLE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^arn:([\w-]+):sts::(\d{12}):assumed-role/([\w+=,.@-]+)/([\w+=,.@-]+)$")
        .expect("Invalid assumed-role regex")
});

/// `arn:<partition>:iam::<account>:role/<path/><name>` or `:user/...`
static IAM_PRINCIPAL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^arn:[\w-]+:iam::\d{12}:(role|user)/[\w+=,.@/-]+$")
        .expect("Invalid IAM principal regex")
});

/// How a caller ARN maps to the principal grants are issued to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallerPrincipal {
    /// An assumed-role session. Grants go to the underlying role, which has
    /// to be looked up because the session ARN drops the role path.
    AssumedRole { role_name: String },
    /// Already a role or user ARN.
    Iam(String),
}

impl CallerPrincipal {
    pub fn parse(caller_arn: &str) -> Result<Self, GatewayError> {
        if let Some(caps) = ASSUMED_ROLE.captures(caller_arn) {
            return Ok(Self::AssumedRole {
                role_name: caps[3].to_string(),
            });
        }
        if IAM_PRINCIPAL.is_match(caller_arn) {
            return Ok(Self::Iam(caller_arn.to_string()));
        }
        Err(GatewayError::service(
            "sts",
            "GetCallerIdentity",
            format!("unsupported caller ARN: {}", caller_arn),
        ))
    }
}

/// Role name of a role ARN: the last path segment.
pub fn role_name_from_arn(role_arn: &str) -> Option<&str> {
    let (_, resource) = role_arn.rsplit_once(':')?;
    let path = resource.strip_prefix("role/")?;
    path.rsplit('/').next().filter(|name| !name.is_empty())
}

#[derive(Debug, Clone)]
pub struct AwsIdentity {
    sts: aws_sdk_sts::Client,
    iam: aws_sdk_iam::Client,
}

impl AwsIdentity {
    pub fn new(sdk: &SdkConfig) -> Self {
        Self {
            sts: aws_sdk_sts::Client::new(sdk),
            iam: aws_sdk_iam::Client::new(sdk),
        }
    }
}

fn role_name(role_arn: &str) -> GatewayResult<&str> {
    role_name_from_arn(role_arn).ok_or_else(|| GatewayError::Build {
        service: "iam".to_string(),
        reason: format!("not a role ARN: {}", role_arn),
    })
}

#[async_trait]
impl IdentityGateway for AwsIdentity {
    async fn current_principal_arn(&self) -> GatewayResult<String> {
        let output = self
            .sts
            .get_caller_identity()
            .send()
            .await
            .map_err(|e| sdk_error("sts", "GetCallerIdentity", e))?;
        let caller_arn = output.arn().ok_or_else(|| {
            GatewayError::service("sts", "GetCallerIdentity", "response carried no ARN")
        })?;
        tracing::debug!(caller_arn, "Resolved caller identity");

        match CallerPrincipal::parse(caller_arn)? {
            CallerPrincipal::Iam(arn) => Ok(arn),
            CallerPrincipal::AssumedRole { role_name } => {
                let output = self
                    .iam
                    .get_role()
                    .role_name(&role_name)
                    .send()
                    .await
                    .map_err(|e| sdk_error("iam", "GetRole", e))?;
                let role = output.role().ok_or_else(|| GatewayError::NotFound {
                    service: "iam".to_string(),
                    resource: format!("role/{}", role_name),
                })?;
                Ok(role.arn().to_string())
            }
        }
    }

    async fn has_managed_policy(&self, role_arn: &str, policy_arn: &str) -> GatewayResult<bool> {
        let role_name = role_name(role_arn)?;
        let mut pages = self
            .iam
            .list_attached_role_policies()
            .role_name(role_name)
            .into_paginator()
            .send();

        while let Some(page) = pages.next().await {
            let page = page.map_err(|e| sdk_error("iam", "ListAttachedRolePolicies", e))?;
            if page
                .attached_policies()
                .iter()
                .any(|p| p.policy_arn() == Some(policy_arn))
            {
                return Ok(true);
            }
        }
        Ok(false)
    }

    async fn attach_managed_policy(&self, role_arn: &str, policy_arn: &str) -> GatewayResult<()> {
        let role_name = role_name(role_arn)?;
        self.iam
            .attach_role_policy()
            .role_name(role_name)
            .policy_arn(policy_arn)
            .send()
            .await
            .map_err(|e| sdk_error("iam", "AttachRolePolicy", e))?;
        tracing::info!(role = role_arn, policy = policy_arn, "Attached managed policy");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assumed_role_caller() {
        let parsed = CallerPrincipal::parse(
            "arn:aws:sts::222222222222:assumed-role/viewgrant-handler-role/handler-session",
        )
        .expect("parses");
        assert_eq!(
            parsed,
            CallerPrincipal::AssumedRole {
                role_name: "viewgrant-handler-role".to_string()
            }
        );
    }

    #[test]
    fn test_iam_caller_passes_through() {
        let arn = "arn:aws:iam::222222222222:role/service/viewgrant";
        assert_eq!(
            CallerPrincipal::parse(arn).expect("parses"),
            CallerPrincipal::Iam(arn.to_string())
        );
    }

    #[test]
    fn test_other_partition() {
        assert!(matches!(
            CallerPrincipal::parse("arn:aws-cn:sts::222222222222:assumed-role/r/s"),
            Ok(CallerPrincipal::AssumedRole { .. })
        ));
    }

    #[test]
    fn test_unsupported_caller() {
        assert!(CallerPrincipal::parse("arn:aws:sts::222222222222:federated-user/bob").is_err());
        assert!(CallerPrincipal::parse("not an arn").is_err());
    }

    #[test]
    fn test_role_name_from_arn() {
        assert_eq!(
            role_name_from_arn("arn:aws:iam::222222222222:role/datazone_usr_role"),
            Some("datazone_usr_role")
        );
        assert_eq!(
            role_name_from_arn("arn:aws:iam::222222222222:role/service-role/nested/reader"),
            Some("reader")
        );
        assert_eq!(role_name_from_arn("arn:aws:iam::222222222222:user/bob"), None);
        assert_eq!(role_name_from_arn("arn:aws:iam::222222222222:role/"), None);
    }

    proptest::proptest! {
        #[test]
        fn prop_role_name_is_last_segment(
            account in "[0-9]{12}",
            path in proptest::collection::vec("[a-z][a-z0-9-]{0,8}", 0..3),
            name in "[A-Za-z][A-Za-z0-9_+=,.@-]{0,20}",
        ) {
            let mut resource = path.join("/");
            if !resource.is_empty() {
                resource.push('/');
            }
            resource.push_str(&name);
            let arn = format!("arn:aws:iam::{}:role/{}", account, resource);

            proptest::prop_assert_eq!(role_name_from_arn(&arn), Some(name.as_str()));
            proptest::prop_assert_eq!(
                CallerPrincipal::parse(&arn).ok(),
                Some(CallerPrincipal::Iam(arn.clone()))
            );
        }
    }
}
