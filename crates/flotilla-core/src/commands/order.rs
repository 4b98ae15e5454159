//! Order command implementation.
//!
//! Computes service processing layers for a descriptor.

use std::path::PathBuf;

use anyhow::Context;
use serde::Serialize;

use crate::model;
use crate::ordering;

/// Options for the order command
#[derive(Debug, Clone)]
pub struct OrderOptions {
    /// Path to the deployment descriptor YAML
    pub descriptor: PathBuf,
}

impl OrderOptions {
    pub fn new(descriptor: impl Into<PathBuf>) -> Self {
        Self {
            descriptor: descriptor.into(),
        }
    }
}

/// Result of service ordering
#[derive(Debug, Clone, Serialize)]
pub struct OrderReport {
    /// Service resource names, grouped by processing layer
    pub layers: Vec<Vec<String>>,
}

/// Order command orchestrator
#[derive(Debug, Default)]
pub struct OrderCommand;

impl OrderCommand {
    pub fn new() -> Self {
        Self
    }

    pub fn run(&self, options: &OrderOptions) -> anyhow::Result<OrderReport> {
        let descriptor = model::parse_path(&options.descriptor)?;
        let layers = ordering::ready_layers(&descriptor).with_context(|| {
            format!(
                "unable to order services of '{}'",
                options.descriptor.display()
            )
        })?;
        Ok(OrderReport { layers })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_order_reports_layers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mtad.yaml");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(
            br#"
_schema-version: "3"
ID: services
version: 1.0.0
resources:
  - name: database
    type: org.cloudfoundry.managed-service
  - name: schema
    type: org.cloudfoundry.managed-service
    requires:
      - name: database
"#,
        )
        .unwrap();

        let report = OrderCommand::new()
            .run(&OrderOptions::new(&path))
            .unwrap();
        assert_eq!(
            report.layers,
            vec![vec!["database".to_string()], vec!["schema".to_string()]]
        );
    }
}
