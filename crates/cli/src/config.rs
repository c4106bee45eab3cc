use flowline_core::Session;
use flowline_remote::{ConfigError, Credentials};

/// How the CLI obtains its session.
#[derive(Debug)]
pub enum SignIn {
    /// A bearer token issued elsewhere. The CLI does not own it and never
    /// signs it out.
    Token(Session),
    /// Email and password exchanged for a fresh session.
    Password(Credentials),
}

/// Read the sign-in method for the CLI.
///
/// | Env Var                  | Required                                  |
/// |--------------------------|-------------------------------------------|
/// | `FLOWLINE_ACCESS_TOKEN`  | no; takes precedence over email/password  |
/// | `FLOWLINE_REFRESH_TOKEN` | no; only read with an access token        |
/// | `FLOWLINE_EMAIL`         | **yes** without an access token           |
/// | `FLOWLINE_PASSWORD`      | **yes** without an access token           |
pub fn sign_in_from_env() -> Result<SignIn, ConfigError> {
    sign_in_from_lookup(|key| std::env::var(key).ok())
}

pub fn sign_in_from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<SignIn, ConfigError> {
    let non_blank = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    let Some(token) = non_blank("FLOWLINE_ACCESS_TOKEN") else {
        return credentials_from_lookup(&lookup).map(SignIn::Password);
    };
    let refresh = non_blank("FLOWLINE_REFRESH_TOKEN").map(|v| v.trim().to_string());
    let session =
        Session::from_access_token(token.trim(), refresh).map_err(|e| ConfigError::Invalid {
            var: "FLOWLINE_ACCESS_TOKEN",
            expected: "a JWT access token",
            value: e.to_string(),
        })?;
    Ok(SignIn::Token(session))
}

pub fn credentials_from_lookup(
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<Credentials, ConfigError> {
    let email = lookup("FLOWLINE_EMAIL")
        .filter(|v| !v.trim().is_empty())
        .ok_or(ConfigError::Missing("FLOWLINE_EMAIL"))?;
    let password = lookup("FLOWLINE_PASSWORD")
        .filter(|v| !v.is_empty())
        .ok_or(ConfigError::Missing("FLOWLINE_PASSWORD"))?;
    Ok(Credentials::new(email, password))
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde_json::json;

    fn token(user: &str) -> String {
        let exp = chrono::Utc::now().timestamp() + 3600;
        encode(
            &Header::default(),
            &json!({ "sub": user, "exp": exp }),
            &EncodingKey::from_secret(b"auth-service-secret"),
        )
        .unwrap()
    }

    #[test]
    fn both_variables_are_required() {
        let err = credentials_from_lookup(|key| {
            (key == "FLOWLINE_EMAIL").then(|| "jd@flowline.app".to_string())
        })
        .unwrap_err();
        assert_matches!(err, ConfigError::Missing("FLOWLINE_PASSWORD"));
    }

    #[test]
    fn email_is_trimmed() {
        let creds = credentials_from_lookup(|key| match key {
            "FLOWLINE_EMAIL" => Some(" jd@flowline.app ".to_string()),
            "FLOWLINE_PASSWORD" => Some("hunter22".to_string()),
            _ => None,
        })
        .unwrap();
        assert_eq!(creds.email, "jd@flowline.app");
    }

    #[test]
    fn access_token_wins_over_password() {
        let raw = token("3f1c2a");
        let sign_in = sign_in_from_lookup(|key| match key {
            "FLOWLINE_ACCESS_TOKEN" => Some(format!(" {raw} ")),
            "FLOWLINE_REFRESH_TOKEN" => Some("refresh-1".to_string()),
            "FLOWLINE_EMAIL" => Some("jd@flowline.app".to_string()),
            "FLOWLINE_PASSWORD" => Some("hunter22".to_string()),
            _ => None,
        })
        .unwrap();

        let session = assert_matches!(sign_in, SignIn::Token(session) => session);
        assert_eq!(session.user_id(), "3f1c2a");
        assert_eq!(session.access_token, raw);
        assert_eq!(session.refresh_token.as_deref(), Some("refresh-1"));
    }

    #[test]
    fn without_a_token_falls_back_to_password() {
        let sign_in = sign_in_from_lookup(|key| match key {
            "FLOWLINE_ACCESS_TOKEN" => Some("  ".to_string()),
            "FLOWLINE_EMAIL" => Some("jd@flowline.app".to_string()),
            "FLOWLINE_PASSWORD" => Some("hunter22".to_string()),
            _ => None,
        })
        .unwrap();
        assert_matches!(sign_in, SignIn::Password(creds) if creds.email == "jd@flowline.app");
    }

    #[test]
    fn unreadable_token_is_a_config_error() {
        let err = sign_in_from_lookup(|key| {
            (key == "FLOWLINE_ACCESS_TOKEN").then(|| "not.a.jwt".to_string())
        })
        .unwrap_err();
        assert_matches!(err, ConfigError::Invalid { var: "FLOWLINE_ACCESS_TOKEN", .. });
    }
}
