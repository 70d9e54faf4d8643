//! Mock cloud and identity-provider connectors.
//!
//! Both return fixed demonstration data that exercises every built-in rule:
//! an administrator without MFA in each source, an unencrypted database, a
//! public bucket, a region without audit logging, short backup retention,
//! and an account missing from the HR roster.

use chrono::{DateTime, Utc};
use serde_json::{json, Value};

use crate::config::ConnectorSettings;
use crate::connector::{Collections, ConnectionStatus, Connector};
use crate::error::ConnectorResult;

// ---------------------------------------------------------------------------
// AWS
// ---------------------------------------------------------------------------

/// Simulated AWS account: IAM users, resources, CloudTrail and RDS.
#[derive(Debug, Clone)]
pub struct AwsConnector {
    settings: ConnectorSettings,
    region: String,
    account_id: String,
    last_sync: Option<DateTime<Utc>>,
}

impl AwsConnector {
    /// Build from settings `region` (default `us-east-1`) and `account_id`
    /// (default `123456789012`).
    pub fn new(settings: ConnectorSettings) -> Self {
        Self {
            region: settings.str_or("region", "us-east-1").to_string(),
            account_id: settings.str_or("account_id", "123456789012").to_string(),
            settings,
            last_sync: None,
        }
    }

    fn users(&self) -> Value {
        json!([
            {"id": "user-1", "email": "admin@example.com", "name": "Admin User", "role": "admin",
             "is_admin": true, "mfa_enabled": true, "active": true,
             "source_system": "aws_iam", "external_id": "AIDAI123456"},
            {"id": "user-2", "email": "devops@example.com", "name": "DevOps User", "role": "devops",
             "is_admin": true, "mfa_enabled": false, "active": true,
             "source_system": "aws_iam", "external_id": "AIDAI234567"},
            {"id": "user-3", "email": "developer@example.com", "name": "Developer", "role": "developer",
             "is_admin": false, "mfa_enabled": true, "active": true,
             "source_system": "aws_iam", "external_id": "AIDAI345678"}
        ])
    }

    fn resources(&self) -> Value {
        let region = &self.region;
        json!([
            {"id": "rds-prod-1", "resource_type": "rds_instance", "name": "production-db",
             "provider": "aws", "region": region, "encryption_enabled": true,
             "public_access": false, "tags": {"Environment": "production"}},
            {"id": "rds-dev-1", "resource_type": "rds_instance", "name": "development-db",
             "provider": "aws", "region": region, "encryption_enabled": false,
             "public_access": false, "tags": {"Environment": "development"}},
            {"id": "s3-public-1", "resource_type": "s3_bucket", "name": "public-assets-bucket",
             "provider": "aws", "region": region, "encryption_enabled": true,
             "public_access": true, "tags": {}},
            {"id": "s3-private-1", "resource_type": "s3_bucket", "name": "confidential-data",
             "provider": "aws", "region": region, "encryption_enabled": true,
             "public_access": false, "tags": {"Confidential": "true"}}
        ])
    }

    fn cloudtrail_status(&self) -> Value {
        json!([
            {"account_id": self.account_id, "region": "us-east-1", "trail_name": "main-trail",
             "is_multi_region": true, "is_logging": true},
            {"account_id": self.account_id, "region": "us-west-2", "trail_name": null,
             "is_multi_region": false, "is_logging": false}
        ])
    }

    fn databases(&self) -> Value {
        json!([
            {"id": "rds-prod-1", "name": "production-db", "environment": "production",
             "encrypted": true, "backup_retention_period": 14},
            {"id": "rds-dev-1", "name": "development-db", "environment": "development",
             "encrypted": false, "backup_retention_period": 3},
            {"id": "rds-test-1", "name": "test-db", "environment": "production",
             "encrypted": true, "backup_retention_period": 5}
        ])
    }
}

impl Connector for AwsConnector {
    fn name(&self) -> &str {
        "aws"
    }

    fn settings(&self) -> &ConnectorSettings {
        &self.settings
    }

    fn connect(&mut self) -> ConnectorResult<()> {
        tracing::debug!(account_id = %self.account_id, region = %self.region, "aws session ready");
        Ok(())
    }

    fn test_connection(&self) -> ConnectionStatus {
        ConnectionStatus {
            ok: true,
            message: "AWS connection successful".to_string(),
        }
    }

    fn collect_data(&mut self) -> ConnectorResult<Collections> {
        let mut out = Collections::new();
        out.insert("users".to_string(), self.users());
        out.insert("resources".to_string(), self.resources());
        out.insert("cloudtrail_status".to_string(), self.cloudtrail_status());
        out.insert("databases".to_string(), self.databases());
        self.last_sync = Some(Utc::now());
        Ok(out)
    }

    fn last_sync(&self) -> Option<DateTime<Utc>> {
        self.last_sync
    }
}

// ---------------------------------------------------------------------------
// Okta
// ---------------------------------------------------------------------------

/// Simulated Okta tenant with an HR roster feed.
#[derive(Debug, Clone)]
pub struct OktaConnector {
    settings: ConnectorSettings,
    domain: String,
    last_sync: Option<DateTime<Utc>>,
}

impl OktaConnector {
    /// Build from setting `domain` (default `example.okta.com`).
    pub fn new(settings: ConnectorSettings) -> Self {
        Self {
            domain: settings.str_or("domain", "example.okta.com").to_string(),
            settings,
            last_sync: None,
        }
    }

    fn users(&self, now: DateTime<Utc>) -> Value {
        let now = now.to_rfc3339();
        json!([
            {"id": "okta-user-1", "email": "admin@example.com", "name": "Admin User", "role": "admin",
             "is_admin": true, "mfa_enabled": true, "active": true,
             "source_system": "okta", "external_id": "okta123456", "last_login": now},
            {"id": "okta-user-2", "email": "security@example.com", "name": "Security Lead", "role": "security",
             "is_admin": true, "mfa_enabled": false, "active": true,
             "source_system": "okta", "external_id": "okta234567", "last_login": now},
            {"id": "okta-user-3", "email": "former.employee@example.com", "name": "Former Employee",
             "role": "developer", "is_admin": false, "mfa_enabled": true, "active": true,
             "source_system": "okta", "external_id": "okta345678", "last_login": null},
            {"id": "okta-user-4", "email": "developer@example.com", "name": "Developer", "role": "developer",
             "is_admin": false, "mfa_enabled": true, "active": true,
             "source_system": "okta", "external_id": "okta456789", "last_login": now}
        ])
    }

    fn hr_employees(&self) -> Value {
        json!([
            {"employee_id": "emp-1", "email": "admin@example.com", "name": "Admin User",
             "status": "active", "department": "IT"},
            {"employee_id": "emp-2", "email": "security@example.com", "name": "Security Lead",
             "status": "active", "department": "Security"},
            {"employee_id": "emp-4", "email": "developer@example.com", "name": "Developer",
             "status": "active", "department": "Engineering"}
        ])
    }
}

impl Connector for OktaConnector {
    fn name(&self) -> &str {
        "okta"
    }

    fn settings(&self) -> &ConnectorSettings {
        &self.settings
    }

    fn connect(&mut self) -> ConnectorResult<()> {
        tracing::debug!(domain = %self.domain, "okta session ready");
        Ok(())
    }

    fn test_connection(&self) -> ConnectionStatus {
        ConnectionStatus {
            ok: true,
            message: "Okta connection successful".to_string(),
        }
    }

    fn collect_data(&mut self) -> ConnectorResult<Collections> {
        let now = Utc::now();
        let mut out = Collections::new();
        out.insert("users".to_string(), self.users(now));
        out.insert("hr_employees".to_string(), self.hr_employees());
        self.last_sync = Some(now);
        Ok(out)
    }

    fn last_sync(&self) -> Option<DateTime<Utc>> {
        self.last_sync
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aws_collects_all_collections() {
        let mut aws = AwsConnector::new(ConnectorSettings::new());
        assert!(aws.last_sync().is_none());
        aws.connect().unwrap();
        let data = aws.collect_data().unwrap();
        assert_eq!(
            data.keys().map(String::as_str).collect::<Vec<_>>(),
            vec!["cloudtrail_status", "databases", "resources", "users"]
        );
        assert_eq!(data["cloudtrail_status"][0]["account_id"], "123456789012");
        assert!(aws.last_sync().is_some());
    }

    #[test]
    fn aws_uses_configured_account() {
        let mut aws = AwsConnector::new(ConnectorSettings::new().with("account_id", "999"));
        let data = aws.collect_data().unwrap();
        assert_eq!(data["cloudtrail_status"][1]["account_id"], "999");
    }

    #[test]
    fn okta_collects_users_and_roster() {
        let mut okta = OktaConnector::new(ConnectorSettings::new());
        let data = okta.collect_data().unwrap();
        assert_eq!(data["users"].as_array().unwrap().len(), 4);
        assert_eq!(data["hr_employees"].as_array().unwrap().len(), 3);
        assert!(okta.test_connection().ok);
    }

    #[test]
    fn status_redacts_secrets() {
        let okta = OktaConnector::new(ConnectorSettings::new().with("api_key", "k").with("domain", "acme.okta.com"));
        let status = okta.status();
        assert_eq!(status.name, "okta");
        assert!(status.config.get("api_key").is_none());
        assert_eq!(status.config["domain"], "acme.okta.com");
    }
}
