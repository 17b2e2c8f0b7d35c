//! Connection configuration.

/// Startup parameters for a PostgreSQL session.
///
/// The core does not parse connection strings or read the environment;
/// callers fill this in from whatever source they use and hand it to
/// [`Connection::new`][crate::Connection::new].
#[derive(Debug, Clone)]
pub struct Config {
    /// Database user name. Required by the server.
    pub user: String,
    /// Database name. Defaults to the user name server-side when empty.
    pub database: Option<String>,
    /// Password for cleartext or MD5 authentication.
    pub password: Option<String>,
    /// Reported application name.
    pub application_name: Option<String>,
    /// Extra startup parameters sent verbatim in the StartupMessage.
    pub params: Vec<(String, String)>,
}

impl Config {
    /// Create a config for the given user with everything else unset.
    pub fn new(user: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            database: None,
            password: None,
            application_name: None,
            params: Vec::new(),
        }
    }

    /// Set the database name.
    pub fn database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    /// Set the password.
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Set the application name.
    pub fn application_name(mut self, name: impl Into<String>) -> Self {
        self.application_name = Some(name.into());
        self
    }

    /// Append an extra startup parameter.
    pub fn param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((name.into(), value.into()));
        self
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new("postgres")
    }
}
