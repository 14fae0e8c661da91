//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check referential integrity (routes reference existing balancers)
//! - Validate value ranges (worker URLs, lbfactor)
//! - Worker URLs must be plain `http`; the upstream clients do not speak TLS
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ProxyConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system
//! - `lbfactor = 0` and a missing probe timeout are not errors; they fall
//!   back to defaults with a warning when the balancers are built

use std::collections::HashSet;

use url::Url;

use crate::config::schema::ProxyConfig;

/// Highest accepted `lbfactor`.
pub const MAX_LBFACTOR: u32 = 100;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("balancer name must not be empty")]
    EmptyBalancerName,
    #[error("duplicate balancer '{0}'")]
    DuplicateBalancer(String),
    #[error("balancer '{balancer}' worker #{index}: invalid url '{url}'")]
    InvalidWorkerUrl {
        balancer: String,
        index: usize,
        url: String,
    },
    #[error("balancer '{balancer}' worker #{index}: scheme '{scheme}' is not supported, only http")]
    UnsupportedScheme {
        balancer: String,
        index: usize,
        scheme: String,
    },
    #[error("balancer '{balancer}' worker #{index}: lbfactor {lbfactor} exceeds 100")]
    LbFactorOutOfRange {
        balancer: String,
        index: usize,
        lbfactor: u32,
    },
    #[error("route '{route}' references unknown balancer '{balancer}'")]
    UnknownBalancer { route: String, balancer: String },
    #[error("invalid listener address '{0}'")]
    InvalidBindAddress(String),
}

pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config
        .listener
        .bind_address
        .parse::<std::net::SocketAddr>()
        .is_err()
    {
        errors.push(ValidationError::InvalidBindAddress(
            config.listener.bind_address.clone(),
        ));
    }

    let mut names = HashSet::new();
    for balancer in &config.balancers {
        if balancer.name.is_empty() {
            errors.push(ValidationError::EmptyBalancerName);
        } else if !names.insert(balancer.name.as_str()) {
            errors.push(ValidationError::DuplicateBalancer(balancer.name.clone()));
        }

        for (index, worker) in balancer.workers.iter().enumerate() {
            match Url::parse(&worker.url) {
                Ok(url) if url.host_str().is_none() => {
                    errors.push(ValidationError::InvalidWorkerUrl {
                        balancer: balancer.name.clone(),
                        index,
                        url: worker.url.clone(),
                    });
                }
                Ok(url) if url.scheme() != "http" => {
                    errors.push(ValidationError::UnsupportedScheme {
                        balancer: balancer.name.clone(),
                        index,
                        scheme: url.scheme().to_string(),
                    });
                }
                Ok(_) => {}
                Err(_) => {
                    errors.push(ValidationError::InvalidWorkerUrl {
                        balancer: balancer.name.clone(),
                        index,
                        url: worker.url.clone(),
                    });
                }
            }
            if worker.lbfactor > MAX_LBFACTOR {
                errors.push(ValidationError::LbFactorOutOfRange {
                    balancer: balancer.name.clone(),
                    index,
                    lbfactor: worker.lbfactor,
                });
            }
        }
    }

    for route in &config.routes {
        if !names.contains(route.balancer.as_str()) {
            errors.push(ValidationError::UnknownBalancer {
                route: route.name.clone(),
                balancer: route.balancer.clone(),
            });
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::{BalancerConfig, RouteConfig, WorkerConfig};

    fn balancer(name: &str, urls: &[&str]) -> BalancerConfig {
        BalancerConfig {
            name: name.into(),
            workers: urls
                .iter()
                .map(|u| WorkerConfig {
                    url: u.to_string(),
                    ..WorkerConfig::default()
                })
                .collect(),
        }
    }

    fn route(balancer: &str) -> RouteConfig {
        RouteConfig {
            name: "r".into(),
            host: None,
            path_prefix: Some("/".into()),
            balancer: balancer.into(),
            priority: 0,
        }
    }

    #[test]
    fn test_valid_config() {
        let mut config = ProxyConfig::default();
        config.balancers.push(balancer("web", &["http://127.0.0.1:3000"]));
        config.routes.push(route("web"));
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&ProxyConfig::default()).is_ok());
    }

    #[test]
    fn test_collects_all_errors() {
        let mut config = ProxyConfig::default();
        config.balancers.push(balancer("web", &["not a url", "http://127.0.0.1:3000"]));
        config.balancers.push(balancer("web", &[]));
        config.balancers[0].workers[1].lbfactor = 500;
        config.routes.push(route("missing"));

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 4);
        assert!(errors.contains(&ValidationError::DuplicateBalancer("web".into())));
        assert!(errors.contains(&ValidationError::UnknownBalancer {
            route: "r".into(),
            balancer: "missing".into(),
        }));
        assert!(errors.iter().any(|e| matches!(e, ValidationError::InvalidWorkerUrl { index: 0, .. })));
        assert!(errors.iter().any(|e| matches!(e, ValidationError::LbFactorOutOfRange { lbfactor: 500, .. })));
    }

    #[test]
    fn test_rejects_non_http_scheme() {
        let mut config = ProxyConfig::default();
        config.balancers.push(balancer(
            "web",
            &["http://127.0.0.1:3000", "https://127.0.0.1:3443", "ftp://files.internal"],
        ));

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(
            errors,
            vec![
                ValidationError::UnsupportedScheme {
                    balancer: "web".into(),
                    index: 1,
                    scheme: "https".into(),
                },
                ValidationError::UnsupportedScheme {
                    balancer: "web".into(),
                    index: 2,
                    scheme: "ftp".into(),
                },
            ]
        );
    }

    #[test]
    fn test_zero_lbfactor_is_not_an_error() {
        let mut config = ProxyConfig::default();
        config.balancers.push(balancer("web", &["http://127.0.0.1:3000"]));
        config.balancers[0].workers[0].lbfactor = 0;
        assert!(validate_config(&config).is_ok());
    }
}
