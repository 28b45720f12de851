use std::env;
use std::str::FromStr;

// Cost range bcrypt accepts
const MIN_BCRYPT_COST: u32 = 4;
const MAX_BCRYPT_COST: u32 = 31;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreBackend {
    Mongo { uri: String },
    Memory,
}

/// Token and password hashing settings, shared with handlers through `web::Data`.
#[derive(Debug, Clone)]
pub struct AuthSettings {
    pub jwt_secret: String,
    pub token_ttl_secs: i64,
    pub bcrypt_cost: u32,
}

#[derive(Debug, Clone)]
pub struct SuperAdminSeed {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub store: StoreBackend,
    pub auth: AuthSettings,
    pub super_admin: Option<SuperAdminSeed>,
    pub cors_origins: Vec<String>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, String> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self, String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let host = lookup("HOST").unwrap_or_else(|| "0.0.0.0".to_string());
        let port = parse_or(&lookup, "PORT", 3000u16)?;

        let store = match lookup("STORE_BACKEND").as_deref().unwrap_or("mongodb") {
            "mongodb" => StoreBackend::Mongo {
                uri: lookup("DATABASE_URL").ok_or("DATABASE_URL must be set")?,
            },
            "memory" => StoreBackend::Memory,
            other => return Err(format!("Unknown STORE_BACKEND '{}'. Supported: mongodb, memory", other)),
        };

        let jwt_secret = lookup("JWT_SECRET")
            .filter(|s| !s.is_empty())
            .ok_or("JWT_SECRET must be set")?;

        let bcrypt_cost = parse_or(&lookup, "BCRYPT_COST", 10u32)?;
        if !(MIN_BCRYPT_COST..=MAX_BCRYPT_COST).contains(&bcrypt_cost) {
            return Err(format!(
                "BCRYPT_COST must be between {} and {}",
                MIN_BCRYPT_COST, MAX_BCRYPT_COST
            ));
        }

        let token_ttl_secs = parse_or(&lookup, "TOKEN_TTL_SECS", 3600i64)?;
        if token_ttl_secs <= 0 {
            return Err(format!("TOKEN_TTL_SECS must be positive, got {}", token_ttl_secs));
        }

        let auth = AuthSettings {
            jwt_secret,
            token_ttl_secs,
            bcrypt_cost,
        };

        let super_admin = match (lookup("SUPER_ADMIN_EMAIL"), lookup("SUPER_ADMIN_PASSWORD")) {
            (Some(email), Some(password)) => Some(SuperAdminSeed {
                name: lookup("SUPER_ADMIN_NAME").unwrap_or_else(|| "Super Admin".to_string()),
                email,
                password,
            }),
            _ => None,
        };

        let cors_origins = lookup("CORS_ORIGINS")
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        Ok(AppConfig { host, port, store, auth, super_admin, cors_origins })
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T, String>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| format!("{} has an invalid value: '{}'", key, raw)),
        None => Ok(default),
    }
}
