//! GPU context management - wgpu device and queue initialization.

use crate::gpu::GpuError;
use wgpu::{Device, Features, Instance, Limits, Queue, RequestAdapterOptions};

pub struct GpuContext {
    pub device: Device,
    pub queue: Queue,
}

impl GpuContext {
    /// Initialize GPU context asynchronously.
    ///
    /// Selects the first available GPU adapter and creates a device with
    /// compute shader support.
    pub async fn new() -> Result<Self, GpuError> {
        let instance = Instance::new(wgpu::InstanceDescriptor {
            backends: {
                #[cfg(target_os = "macos")]
                {
                    wgpu::Backends::METAL
                }
                #[cfg(not(target_os = "macos"))]
                {
                    wgpu::Backends::PRIMARY
                }
            },
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                force_fallback_adapter: false,
                compatible_surface: None,
            })
            .await
            .ok_or(GpuError::NoAdapter)?;

        let info = adapter.get_info();
        log::info!("GPU: {} ({:?})", info.name, info.backend);

        let limits = adapter.limits();
        log::debug!(
            "GPU max storage buffer binding size: {} MB",
            limits.max_storage_buffer_binding_size / (1024 * 1024)
        );

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("Avatar Reskin Device"),
                    required_features: Features::empty(),
                    required_limits: Limits::default(),
                },
                None,
            )
            .await?;

        device.on_uncaptured_error(Box::new(|e| {
            log::error!("[wgpu] uncaptured error: {e}");
        }));

        Ok(Self { device, queue })
    }

    /// Synchronous wrapper using pollster.
    pub fn new_blocking() -> Result<Self, GpuError> {
        pollster::block_on(Self::new())
    }

    /// Start capturing out-of-memory and validation errors.
    ///
    /// Every call must be matched by [`GpuContext::pop_error_scopes`].
    pub fn push_error_scopes(&self) {
        self.device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
    }

    /// Stop capturing and turn the first captured error into a [`GpuError`].
    pub fn pop_error_scopes(&self, stage: &'static str) -> Result<(), GpuError> {
        let validation = pollster::block_on(self.device.pop_error_scope());
        let out_of_memory = pollster::block_on(self.device.pop_error_scope());
        match validation.or(out_of_memory) {
            Some(e) => Err(GpuError::Device {
                stage,
                message: e.to_string(),
            }),
            None => Ok(()),
        }
    }
}
