use std::env;
use std::ops::RangeInclusive;
use std::time::Duration;

#[derive(Debug, Clone, serde::Deserialize)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub jwt_expiration_secs: u64,
    pub server_host: String,
    pub server_port: u16,
    pub api_base_uri: String,
    /// 允许自动分班的毕业年份下限（含）
    pub graduation_year_min: i32,
    /// 允许自动分班的毕业年份上限（含）
    pub graduation_year_max: i32,
    pub assign_max_attempts: u32,
    pub assign_backoff_ms: u64,
    pub assign_backoff_max_ms: u64,
    pub seed_class_groups: bool,
    /// 后台对账间隔，0 表示关闭
    pub reconcile_interval_secs: u64,
}

impl Config {
    pub fn from_env() -> Result<Self, env::VarError> {
        dotenv::dotenv().ok();

        let jwt_expiration = env::var("JWT_EXPIRATION")?
            .trim_end_matches('h')
            .parse::<u64>()
            .unwrap_or(24);

        Ok(Config {
            database_url: env::var("DATABASE_URL")?,
            server_host: env::var("SERVER_HOST")?,
            server_port: env::var("SERVER_PORT")?.parse().unwrap_or(3000),
            jwt_secret: env::var("JWT_SECRET")?,
            jwt_expiration_secs: jwt_expiration * 3600,
            api_base_uri: env::var("API_BASE_URI").unwrap_or_else(|_| "/api".into()),
            graduation_year_min: var_or("GRADUATION_YEAR_MIN", 2007),
            graduation_year_max: var_or("GRADUATION_YEAR_MAX", 2025),
            assign_max_attempts: var_or("ASSIGN_MAX_ATTEMPTS", 3),
            assign_backoff_ms: var_or("ASSIGN_BACKOFF_MS", 100),
            assign_backoff_max_ms: var_or("ASSIGN_BACKOFF_MAX_MS", 2000),
            seed_class_groups: var_or("SEED_CLASS_GROUPS", true),
            reconcile_interval_secs: var_or("RECONCILE_INTERVAL_SECS", 0),
        })
    }

    pub fn jwt_expiration(&self) -> Duration {
        Duration::from_secs(self.jwt_expiration_secs)
    }

    pub fn graduation_years(&self) -> RangeInclusive<i32> {
        self.graduation_year_min..=self.graduation_year_max
    }

    pub fn assign_backoff(&self) -> Duration {
        Duration::from_millis(self.assign_backoff_ms)
    }

    pub fn assign_backoff_max(&self) -> Duration {
        Duration::from_millis(self.assign_backoff_max_ms)
    }

    pub fn reconcile_interval(&self) -> Option<Duration> {
        match self.reconcile_interval_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }
}

// 可选变量：缺失或格式错误时使用默认值
fn var_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    parse_or(env::var(key).ok().as_deref(), default)
}

fn parse_or<T: std::str::FromStr>(raw: Option<&str>, default: T) -> T {
    raw.and_then(|v| v.trim().parse().ok()).unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Config {
        Config {
            database_url: "postgres://localhost/alumni".into(),
            jwt_secret: "secret".into(),
            jwt_expiration_secs: 3600,
            server_host: "127.0.0.1".into(),
            server_port: 3000,
            api_base_uri: "/api".into(),
            graduation_year_min: 2007,
            graduation_year_max: 2025,
            assign_max_attempts: 3,
            assign_backoff_ms: 100,
            assign_backoff_max_ms: 2000,
            seed_class_groups: true,
            reconcile_interval_secs: 0,
        }
    }

    #[test]
    fn graduation_years_are_inclusive() {
        let years = sample().graduation_years();
        assert!(years.contains(&2007));
        assert!(years.contains(&2025));
        assert!(!years.contains(&2006));
        assert!(!years.contains(&2026));
    }

    #[test]
    fn zero_interval_disables_reconcile() {
        let mut config = sample();
        assert_eq!(config.reconcile_interval(), None);
        config.reconcile_interval_secs = 30;
        assert_eq!(config.reconcile_interval(), Some(Duration::from_secs(30)));
    }

    #[test]
    fn malformed_optional_value_falls_back() {
        assert_eq!(parse_or(Some("not-a-number"), 7u32), 7);
        assert_eq!(parse_or::<u32>(None, 9), 9);
        assert_eq!(parse_or(Some(" 42 "), 7u32), 42);
        assert!(!parse_or(Some("false"), true));
    }

    #[test]
    fn unset_optional_var_uses_default() {
        assert_eq!(var_or("ALUMNI_UNSET_OPTIONAL_NUMBER", 9u32), 9);
    }
}
