use std::collections::HashMap;

use bollard::container::{Config, CreateContainerOptions, ListContainersOptions, StartContainerOptions};
use bollard::models::HostConfig;
use bollard::Docker;
use tracing::{info, warn};

use crate::config::ContainerConfig;
use crate::errors::FlaghuntError;

#[derive(Debug, Clone, PartialEq)]
pub enum ContainerStatus {
    Running,
    Stopped,
    NotFound,
}

/// The tool container hosting the browser server and scanning utilities.
pub struct ContainerManager {
    docker: Docker,
    image: String,
    container_name: String,
    network_mode: String,
    capabilities: Vec<String>,
}

impl ContainerManager {
    pub fn new(config: &ContainerConfig) -> Result<Self, FlaghuntError> {
        let docker = Docker::connect_with_local_defaults()
            .map_err(|e| FlaghuntError::DriverInit(format!("Failed to connect to Docker: {}", e)))?;
        let defaults = ContainerConfig::default();

        Ok(Self {
            docker,
            image: config.image.clone().or(defaults.image).unwrap_or_default(),
            container_name: config.name.clone().or(defaults.name).unwrap_or_default(),
            network_mode: config.network_mode.clone().or(defaults.network_mode).unwrap_or_default(),
            capabilities: config.capabilities.clone().or(defaults.capabilities).unwrap_or_default(),
        })
    }

    pub async fn status(&self) -> ContainerStatus {
        let mut filters = HashMap::new();
        filters.insert("name".to_string(), vec![self.container_name.clone()]);
        let options = ListContainersOptions { all: true, filters, ..Default::default() };

        let Ok(containers) = self.docker.list_containers(Some(options)).await else {
            return ContainerStatus::NotFound;
        };
        let target = format!("/{}", self.container_name);
        containers
            .iter()
            .find(|c| c.names.as_ref().is_some_and(|names| names.contains(&target)))
            .map(|c| match c.state.as_deref() {
                Some("running") => ContainerStatus::Running,
                _ => ContainerStatus::Stopped,
            })
            .unwrap_or(ContainerStatus::NotFound)
    }

    pub async fn ensure_running(&self) -> Result<(), FlaghuntError> {
        match self.status().await {
            ContainerStatus::Running => {
                info!(container = %self.container_name, "Tool container already running");
                Ok(())
            }
            ContainerStatus::Stopped => {
                info!(container = %self.container_name, "Starting existing tool container");
                self.start().await
            }
            ContainerStatus::NotFound => {
                info!(container = %self.container_name, image = %self.image, "Creating tool container");
                self.ensure_image().await?;
                self.create().await?;
                self.start().await
            }
        }
    }

    async fn ensure_image(&self) -> Result<(), FlaghuntError> {
        if self.docker.inspect_image(&self.image).await.is_ok() {
            return Ok(());
        }
        warn!(image = %self.image, "Tool image not found locally");
        Err(FlaghuntError::Container(format!(
            "Image '{}' not found. Build or pull it, or set container.image in the config",
            self.image
        )))
    }

    async fn create(&self) -> Result<(), FlaghuntError> {
        let host_config = HostConfig {
            network_mode: Some(self.network_mode.clone()),
            cap_add: Some(self.capabilities.clone()),
            shm_size: Some(2 * 1024 * 1024 * 1024),
            ..Default::default()
        };
        let config = Config {
            image: Some(self.image.clone()),
            cmd: Some(vec!["sleep".to_string(), "infinity".to_string()]),
            host_config: Some(host_config),
            ..Default::default()
        };
        let options = CreateContainerOptions { name: self.container_name.as_str(), platform: None };

        self.docker
            .create_container(Some(options), config)
            .await
            .map_err(|e| FlaghuntError::Container(format!("Failed to create container: {}", e)))?;
        Ok(())
    }

    async fn start(&self) -> Result<(), FlaghuntError> {
        self.docker
            .start_container(&self.container_name, None::<StartContainerOptions<String>>)
            .await
            .map_err(|e| FlaghuntError::Container(format!("Failed to start container: {}", e)))?;
        info!(container = %self.container_name, "Tool container started");
        Ok(())
    }

    pub fn docker(&self) -> &Docker {
        &self.docker
    }

    pub fn container_name(&self) -> &str {
        &self.container_name
    }
}
