//! # Credential Store
//!
//! Holds the install credential and the static client metadata that goes
//! out with every token negotiation. Immutable once the session is built.
//!
//! The install credential never appears in logs: `Debug` prints only its
//! fingerprint.

use parley_core::keys::{credential_fingerprint, synthetic_thread_key, KeyPurpose};

use crate::config::CredentialSettings;
use crate::error::{SyncError, SyncResult};

/// Header carrying the platform identifier.
pub const HEADER_PLATFORM: &str = "x-client-platform";
/// Header carrying the package / bundle identifier.
pub const HEADER_PACKAGE: &str = "x-client-package";
/// Header carrying the host application version.
pub const HEADER_VERSION: &str = "x-client-version";
/// Header carrying the Android signing certificate proof.
pub const HEADER_ANDROID_CERT: &str = "x-binding-android-cert";
/// Header carrying the iOS team identifier proof.
pub const HEADER_IOS_TEAM: &str = "x-binding-ios-team";

// =============================================================================
// Binding Proofs
// =============================================================================

/// Platform binding proofs, produced by probes outside this crate.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BindingProofs {
    /// SHA-256 of the Android signing certificate.
    pub android_cert_sha256: Option<String>,
    /// Apple developer team identifier.
    pub ios_team_id: Option<String>,
}

impl BindingProofs {
    /// Returns true if no proof is present.
    pub fn is_empty(&self) -> bool {
        self.android_cert_sha256.is_none() && self.ios_team_id.is_none()
    }
}

// =============================================================================
// Credential
// =============================================================================

/// Install credential plus client metadata.
#[derive(Clone)]
pub struct Credential {
    api_key: String,
    fingerprint: String,
    platform: String,
    package_id: String,
    app_version: String,
    binding: BindingProofs,
}

impl Credential {
    /// Creates a credential without binding proofs.
    pub fn new(
        api_key: impl Into<String>,
        platform: impl Into<String>,
        package_id: impl Into<String>,
        app_version: impl Into<String>,
    ) -> Self {
        let api_key = api_key.into();
        Credential {
            fingerprint: credential_fingerprint(&api_key),
            api_key,
            platform: platform.into(),
            package_id: package_id.into(),
            app_version: app_version.into(),
            binding: BindingProofs::default(),
        }
    }

    /// Attaches binding proofs.
    pub fn with_binding(mut self, binding: BindingProofs) -> Self {
        self.binding = binding;
        self
    }

    /// Builds a credential from the `[credential]` config section.
    pub fn from_settings(settings: &CredentialSettings) -> SyncResult<Self> {
        let api_key = settings.api_key.trim();
        if api_key.is_empty() {
            return Err(SyncError::InvalidConfig(
                "credential.api_key must be set".into(),
            ));
        }

        Ok(Credential::new(
            api_key,
            &settings.platform,
            &settings.package_id,
            &settings.app_version,
        )
        .with_binding(BindingProofs {
            android_cert_sha256: settings.android_cert_sha256.clone(),
            ios_team_id: settings.ios_team_id.clone(),
        }))
    }

    /// The install credential. Only the token negotiation should read this.
    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    /// SHA-256 of the install credential, safe to log.
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    /// Platform identifier.
    pub fn platform(&self) -> &str {
        &self.platform
    }

    /// Binding proofs.
    pub fn binding(&self) -> &BindingProofs {
        &self.binding
    }

    /// Synthetic thread key for a non-content operation.
    pub fn synthetic_key(&self, purpose: KeyPurpose) -> String {
        synthetic_thread_key(&self.api_key, purpose)
    }

    /// Client metadata and binding proof headers for the token endpoint.
    ///
    /// Empty values are left out.
    pub fn client_headers(&self) -> Vec<(&'static str, String)> {
        let mut headers = Vec::with_capacity(5);

        for (name, value) in [
            (HEADER_PLATFORM, &self.platform),
            (HEADER_PACKAGE, &self.package_id),
            (HEADER_VERSION, &self.app_version),
        ] {
            if !value.is_empty() {
                headers.push((name, value.clone()));
            }
        }

        if let Some(cert) = &self.binding.android_cert_sha256 {
            headers.push((HEADER_ANDROID_CERT, cert.clone()));
        }
        if let Some(team) = &self.binding.ios_team_id {
            headers.push((HEADER_IOS_TEAM, team.clone()));
        }

        headers
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("fingerprint", &&self.fingerprint[..12])
            .field("platform", &self.platform)
            .field("package_id", &self.package_id)
            .field("app_version", &self.app_version)
            .field("has_binding", &!self.binding.is_empty())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_never_prints_api_key() {
        let credential = Credential::new("pk_live_secret", "android", "com.example", "1.0");
        let debug = format!("{:?}", credential);
        assert!(!debug.contains("pk_live_secret"));
        assert!(debug.contains(&credential.fingerprint()[..12]));
    }

    #[test]
    fn test_client_headers() {
        let credential = Credential::new("pk", "ios", "com.example.app", "2.1.0").with_binding(
            BindingProofs {
                android_cert_sha256: None,
                ios_team_id: Some("ABCDE12345".into()),
            },
        );

        let headers = credential.client_headers();
        assert!(headers.contains(&(HEADER_PLATFORM, "ios".to_string())));
        assert!(headers.contains(&(HEADER_PACKAGE, "com.example.app".to_string())));
        assert!(headers.contains(&(HEADER_IOS_TEAM, "ABCDE12345".to_string())));
        assert!(!headers.iter().any(|(name, _)| *name == HEADER_ANDROID_CERT));
    }

    #[test]
    fn test_empty_metadata_is_omitted() {
        let credential = Credential::new("pk", "linux", "", "");
        assert_eq!(credential.client_headers().len(), 1);
    }

    #[test]
    fn test_from_settings_requires_api_key() {
        let settings = CredentialSettings::default();
        assert!(Credential::from_settings(&settings).is_err());

        let settings = CredentialSettings {
            api_key: " pk_test_123 ".into(),
            android_cert_sha256: Some("ab:cd".into()),
            ..Default::default()
        };
        let credential = Credential::from_settings(&settings).unwrap();
        assert_eq!(credential.api_key(), "pk_test_123");
        assert_eq!(credential.binding().android_cert_sha256.as_deref(), Some("ab:cd"));
    }

    #[test]
    fn test_synthetic_keys_are_per_purpose() {
        let credential = Credential::new("pk_test_123", "linux", "com.example", "1.0");
        let meta = credential.synthetic_key(KeyPurpose::Meta);
        let settings = credential.synthetic_key(KeyPurpose::Settings);
        assert!(meta.starts_with("sys:meta:"));
        assert!(settings.starts_with("sys:settings:"));
        assert_ne!(meta, settings);
    }
}
