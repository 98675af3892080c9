use secrecy::SecretString;

/// Secrets and delivery settings shared across actions.
#[derive(Debug, Clone)]
pub struct GlobalArgs {
    pub jwt_secret: SecretString,
    pub email_from: String,
    pub email_api_url: Option<String>,
    pub email_api_token: SecretString,
}

impl GlobalArgs {
    #[must_use]
    pub fn new(email_from: String) -> Self {
        Self {
            jwt_secret: SecretString::default(),
            email_from,
            email_api_url: None,
            email_api_token: SecretString::default(),
        }
    }

    pub fn set_jwt_secret(&mut self, secret: SecretString) {
        self.jwt_secret = secret;
    }

    pub fn set_email_api(&mut self, url: Option<String>, token: SecretString) {
        self.email_api_url = url;
        self.email_api_token = token;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    #[test]
    fn test_global_args() {
        let args = GlobalArgs::new("no-reply@blockbustre.com".to_string());
        assert_eq!(args.email_from, "no-reply@blockbustre.com");
        assert_eq!(args.jwt_secret.expose_secret(), "");
        assert!(args.email_api_url.is_none());
    }

    #[test]
    fn test_set_jwt_secret() {
        let mut args = GlobalArgs::new("no-reply@blockbustre.com".to_string());
        args.set_jwt_secret(SecretString::from("sekret".to_string()));
        assert_eq!(args.jwt_secret.expose_secret(), "sekret");
    }

    #[test]
    fn test_set_email_api() {
        let mut args = GlobalArgs::new("no-reply@blockbustre.com".to_string());
        args.set_email_api(
            Some("https://mail.example.com/send".to_string()),
            SecretString::from("token".to_string()),
        );
        assert_eq!(
            args.email_api_url.as_deref(),
            Some("https://mail.example.com/send")
        );
        assert_eq!(args.email_api_token.expose_secret(), "token");
    }
}
