// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::constants::{MAX_NAME_LENGTH, RETENTION_DAYS};
use crate::error::ConfigError;
use std::env;

/// Destination of a [`crate::Consumer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumerOptions {
    /// Region selecting the sink endpoint (e.g., us-east-1)
    pub region: String,
    /// Log group receiving the events
    pub group: String,
    /// Log stream inside the group
    pub stream: String,
    /// Retention applied to the group on first use; `None` keeps the sink default
    pub retention_in_days: Option<u32>,
}

impl ConsumerOptions {
    pub fn new(
        region: impl Into<String>,
        group: impl Into<String>,
        stream: impl Into<String>,
    ) -> Self {
        Self {
            region: region.into(),
            group: group.into(),
            stream: stream.into(),
            retention_in_days: None,
        }
    }

    #[must_use]
    pub fn with_retention_in_days(mut self, days: u32) -> Self {
        self.retention_in_days = Some(days);
        self
    }

    /// Create options from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let region = env::var("LOG_SHIPPER_REGION")
            .or_else(|_| env::var("AWS_REGION"))
            .map_err(|_| ConfigError::Missing("LOG_SHIPPER_REGION"))?;
        let group =
            env::var("LOG_SHIPPER_GROUP").map_err(|_| ConfigError::Missing("LOG_SHIPPER_GROUP"))?;
        let stream = env::var("LOG_SHIPPER_STREAM")
            .map_err(|_| ConfigError::Missing("LOG_SHIPPER_STREAM"))?;
        let retention_in_days = match env::var("LOG_SHIPPER_RETENTION_IN_DAYS") {
            Ok(val) => Some(val.trim().parse::<u32>().map_err(|e| ConfigError::Invalid {
                name: "LOG_SHIPPER_RETENTION_IN_DAYS",
                reason: format!("'{val}' is not a number of days: {e}"),
            })?),
            Err(_) => None,
        };

        let options = Self {
            region,
            group,
            stream,
            retention_in_days,
        };

        options.validate()?;
        Ok(options)
    }

    /// Validate the options
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.region.trim().is_empty() {
            return Err(ConfigError::Invalid {
                name: "region",
                reason: "cannot be empty".to_string(),
            });
        }

        validate_name("group", &self.group)?;
        validate_name("stream", &self.stream)?;

        if self.stream.contains([':', '*']) {
            return Err(ConfigError::Invalid {
                name: "stream",
                reason: format!("'{}' cannot contain ':' or '*'", self.stream),
            });
        }

        if let Some(days) = self.retention_in_days {
            if !RETENTION_DAYS.contains(&days) {
                return Err(ConfigError::Invalid {
                    name: "retention_in_days",
                    reason: format!("{days} is not one of {RETENTION_DAYS:?}"),
                });
            }
        }

        Ok(())
    }
}

fn validate_name(name: &'static str, value: &str) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        return Err(ConfigError::Invalid {
            name,
            reason: "cannot be empty".to_string(),
        });
    }

    if value.chars().count() > MAX_NAME_LENGTH {
        return Err(ConfigError::Invalid {
            name,
            reason: format!("cannot be longer than {MAX_NAME_LENGTH} characters"),
        });
    }

    Ok(())
}
