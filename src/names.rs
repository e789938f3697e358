use crate::error::{Error, Result};

/// Selects a role and the binding which will attach it to a subject.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindingSelector {
    pub role_name: String,
    pub binding_name: String,
}

impl BindingSelector {
    /// Parses the `<role name>:<binding name>` selector format.
    pub fn parse(s: &str) -> Result<Self> {
        let parts: Vec<&str> = s.split(':').collect();
        if parts.len() != 2 || parts[0].is_empty() || parts[1].is_empty() {
            return Err(Error::Input(format!(
                "selector [{s}] does not use format <role name>:<binding name>"
            )));
        }
        Ok(BindingSelector {
            role_name: parts[0].to_string(),
            binding_name: parts[1].to_string(),
        })
    }
}

/// View over a candidate service-account name string.
///
/// `is_valid` is true only when the input used one of the recognized user or
/// group forms, in which case exactly one of `is_group` or a non-empty
/// `basename` holds.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceAccountName {
    pub namespace: String,
    pub basename: String,
    pub is_group: bool,
    pub is_valid: bool,
}

/// Parses a service account user name.
///
/// For `system:serviceaccount:a:b`, it returns namespace "a" and basename "b".
pub fn parse_service_account_user(user: &str) -> Result<(String, String)> {
    let parts: Vec<&str> = user.split(':').collect();

    if parts.len() != 4 {
        return Err(Error::Input(format!(
            "service account user [{user}] contains [{}] parts, expected 4",
            parts.len()
        )));
    }

    if parts[0] != "system" || parts[1] != "serviceaccount" {
        return Err(Error::Input(format!(
            "service account user [{user}] does not begin with 'system:serviceaccount:'"
        )));
    }

    Ok((parts[2].to_string(), parts[3].to_string()))
}

/// Parses a service account group name.
///
/// For `system:serviceaccounts`, it returns namespace "".
/// For `system:serviceaccounts:a`, it returns namespace "a".
pub fn parse_service_account_group(group: &str) -> Result<String> {
    let parts: Vec<&str> = group.split(':').collect();

    if parts.len() != 2 && parts.len() != 3 {
        return Err(Error::Input(format!(
            "service account group [{group}] contains [{}] parts, expected 2 or 3",
            parts.len()
        )));
    }

    if parts[0] != "system" || parts[1] != "serviceaccounts" {
        return Err(Error::Input(format!(
            "service account group [{group}] does not begin with 'system:serviceaccounts:'"
        )));
    }

    if parts.len() == 2 {
        return Ok(String::new());
    }

    Ok(parts[2].to_string())
}

/// Parses a service account name and identifies whether it is a user or group.
pub fn parse_service_account(name: &str) -> ServiceAccountName {
    if let Ok((namespace, basename)) = parse_service_account_user(name) {
        if !basename.is_empty() {
            return ServiceAccountName {
                namespace,
                basename,
                is_group: false,
                is_valid: true,
            };
        }
    }

    if let Ok(namespace) = parse_service_account_group(name) {
        return ServiceAccountName {
            namespace,
            basename: String::new(),
            is_group: true,
            is_valid: true,
        };
    }

    ServiceAccountName::default()
}
