// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use super::api::{
    consts as vk, AttachmentDescription, BufferCopy, BufferCreateInfo, BufferImageCopy,
    ClearAttachment, ClearValue, ComputePipelineCreateInfo, DescriptorSetLayoutBinding,
    DescriptorWrite, GraphicsPipelineCreateInfo, ImageCreateInfo, ImageMemoryBarrier,
    ImageSubresourceRange, ImageViewCreateInfo, MemoryRequirements, PipelineShaderStageCreateInfo,
    RenderPassCreateInfo, SubmitInfo, SwapchainCreateInfo, VertexInputAttributeDescription,
    VertexInputBindingDescription, VkHandle, VkResult, VulkanApi, NULL_HANDLE,
};
use super::conversions::{self, IntoVulkan};
use super::frame::{FramePhase, FrameSync};
use super::pipeline::{
    specialization_info, GraphicsKey, PipelineCache, PipelineKey, VertexInputKey,
    TEXTURE_BINDING_OFFSET,
};
use crate::graphics::common::{alive, check_initial_data, DeviceState};
use std::any::Any;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tessera_core::math::{Extent2D, Extent3D, Origin3D};
use tessera_core::renderer::api::*;
use tessera_core::renderer::shader::ShaderBridge;
use tessera_core::renderer::state_cache::VertexBinding;
use tessera_core::renderer::{
    DeviceError, GraphicsDevice, RenderError, RenderResult, ShaderCode, ShaderCompiler,
    ShaderError, TargetLanguage,
};
use tessera_core::tessera_bitflags;

/// Vertex-buffer bindings a pipeline can declare.
const MAX_VERTEX_BINDINGS: u32 = 16;

tessera_bitflags! {
    /// Bound state that has to be re-recorded before the next draw or dispatch.
    struct Dirty: u32 {
        const PIPELINE = 1 << 0;
        const VERTEX_BUFFERS = 1 << 1;
        const INDEX_BUFFER = 1 << 2;
        const DESCRIPTORS = 1 << 3;
        const DYNAMIC = 1 << 4;
        const ALL = 0b1_1111;
    }
}

#[derive(Debug, Clone)]
struct BoundShader {
    id: ResourceId,
    layout: VkHandle,
    stages: Vec<PipelineShaderStageCreateInfo>,
    compute: bool,
    /// Set-0 bindings the shader declares; pushes skip everything else.
    bindings: BTreeSet<u32>,
}

#[derive(Debug, Clone)]
struct BoundVertexBuffer {
    buffer: VkHandle,
    stride: u32,
    layout: ResourceId,
    rate: VertexInputRate,
    /// Attributes fed from this slot with their shader locations.
    attributes: Vec<(u32, VertexAttribute)>,
}

/// What the application has bound. Survives frames; only the recorded
/// copy of it is rebuilt.
#[derive(Debug, Default)]
struct Bindings {
    shader: Option<BoundShader>,
    vertex_buffers: BTreeMap<u32, BoundVertexBuffer>,
    index_buffer: Option<(VkHandle, IndexFormat)>,
    rasterizer: RasterizerDescriptor,
    blend: BlendDescriptor,
    depth_stencil: DepthStencilDescriptor,
    stencil_reference: u32,
    descriptors: BTreeMap<u32, DescriptorWrite>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct RenderTarget {
    /// `None` renders into the acquired swapchain image.
    framebuffer: Option<(ResourceId, VkHandle)>,
    render_pass: VkHandle,
    extent: Extent2D,
    color_count: u32,
    depth_format: Option<PixelFormat>,
}

/// An image with dedicated memory and one view.
#[derive(Debug, Clone, Copy)]
struct ImageAllocation {
    image: VkHandle,
    memory: VkHandle,
    view: VkHandle,
}

#[derive(Debug, Default)]
struct SwapchainImages {
    handle: VkHandle,
    images: Vec<VkHandle>,
    views: Vec<VkHandle>,
    depth: Option<ImageAllocation>,
    /// One per image, built against the back-buffer render pass.
    framebuffers: Vec<VkHandle>,
}

/// A native object whose destruction waits for the frame that may still
/// reference it.
#[derive(Debug, Clone, Copy)]
enum Retired {
    Pipeline(VkHandle),
    Framebuffer(VkHandle),
    RenderPass(VkHandle),
    ImageView(VkHandle),
    Image(VkHandle),
    Memory(VkHandle),
    Buffer(VkHandle),
    Sampler(VkHandle),
    ShaderModule(VkHandle),
    PipelineLayout(VkHandle),
    DescriptorSetLayout(VkHandle),
    Semaphore(VkHandle),
    Fence(VkHandle),
}

impl Retired {
    fn destroy(self, api: &mut dyn VulkanApi) {
        match self {
            Retired::Pipeline(h) if h != NULL_HANDLE => api.destroy_pipeline(h),
            Retired::Framebuffer(h) if h != NULL_HANDLE => api.destroy_framebuffer(h),
            Retired::RenderPass(h) if h != NULL_HANDLE => api.destroy_render_pass(h),
            Retired::ImageView(h) if h != NULL_HANDLE => api.destroy_image_view(h),
            Retired::Image(h) if h != NULL_HANDLE => api.destroy_image(h),
            Retired::Memory(h) if h != NULL_HANDLE => api.free_memory(h),
            Retired::Buffer(h) if h != NULL_HANDLE => api.destroy_buffer(h),
            Retired::Sampler(h) if h != NULL_HANDLE => api.destroy_sampler(h),
            Retired::ShaderModule(h) if h != NULL_HANDLE => api.destroy_shader_module(h),
            Retired::PipelineLayout(h) if h != NULL_HANDLE => api.destroy_pipeline_layout(h),
            Retired::DescriptorSetLayout(h) if h != NULL_HANDLE => {
                api.destroy_descriptor_set_layout(h)
            }
            Retired::Semaphore(h) if h != NULL_HANDLE => api.destroy_semaphore(h),
            Retired::Fence(h) if h != NULL_HANDLE => api.destroy_fence(h),
            _ => {}
        }
    }
}

/// Index of the first memory type allowed by `type_bits` that has every
/// flag in `properties`.
fn find_memory_type(memory_types: &[u32], type_bits: u32, properties: u32) -> Option<u32> {
    memory_types
        .iter()
        .enumerate()
        .find(|&(index, &flags)| {
            type_bits
                .checked_shr(index as u32)
                .is_some_and(|bits| bits & 1 == 1)
                && flags & properties == properties
        })
        .map(|(index, _)| index as u32)
}

fn allocate_memory(
    api: &mut dyn VulkanApi,
    memory_types: &[u32],
    requirements: MemoryRequirements,
    properties: u32,
) -> Result<VkHandle, DeviceError> {
    let index = find_memory_type(memory_types, requirements.memory_type_bits, properties)
        .ok_or_else(|| {
            DeviceError::new(
                "vkAllocateMemory",
                VkResult::ERROR_OUT_OF_DEVICE_MEMORY.0 as i64,
                format!("no memory type has properties {properties:#x}"),
            )
        })?;
    api.allocate_memory(requirements.size, index)
        .map_err(|result| result.into_device_error("vkAllocateMemory"))
}

/// Creates a buffer backed by its own allocation.
fn create_bound_buffer(
    api: &mut dyn VulkanApi,
    memory_types: &[u32],
    size: u64,
    usage: u32,
    properties: u32,
) -> Result<(VkHandle, VkHandle), DeviceError> {
    let buffer = api
        .create_buffer(&BufferCreateInfo { size, usage })
        .map_err(|result| result.into_device_error("vkCreateBuffer"))?;
    let requirements = api.buffer_memory_requirements(buffer);
    let memory = match allocate_memory(api, memory_types, requirements, properties) {
        Ok(memory) => memory,
        Err(err) => {
            api.destroy_buffer(buffer);
            return Err(err);
        }
    };
    if let Err(err) = api.bind_buffer_memory(buffer, memory).check("vkBindBufferMemory") {
        api.free_memory(memory);
        api.destroy_buffer(buffer);
        return Err(err);
    }
    Ok((buffer, memory))
}

/// Creates an image backed by device-local memory.
fn create_bound_image(
    api: &mut dyn VulkanApi,
    memory_types: &[u32],
    info: &ImageCreateInfo,
) -> Result<(VkHandle, VkHandle), DeviceError> {
    let image = api
        .create_image(info)
        .map_err(|result| result.into_device_error("vkCreateImage"))?;
    let requirements = api.image_memory_requirements(image);
    let memory = match allocate_memory(
        api,
        memory_types,
        requirements,
        vk::MEMORY_PROPERTY_DEVICE_LOCAL,
    ) {
        Ok(memory) => memory,
        Err(err) => {
            api.destroy_image(image);
            return Err(err);
        }
    };
    if let Err(err) = api.bind_image_memory(image, memory).check("vkBindImageMemory") {
        api.free_memory(memory);
        api.destroy_image(image);
        return Err(err);
    }
    Ok((image, memory))
}

fn write_memory(
    api: &mut dyn VulkanApi,
    memory: VkHandle,
    offset: u64,
    data: &[u8],
) -> Result<(), DeviceError> {
    let ptr = api
        .map_memory(memory, offset, data.len() as u64)
        .map_err(|result| result.into_device_error("vkMapMemory"))?;
    // SAFETY: the mapping starts at `offset` and spans `data.len()` bytes.
    unsafe {
        std::ptr::copy_nonoverlapping(data.as_ptr(), ptr.as_ptr(), data.len());
    }
    api.unmap_memory(memory);
    Ok(())
}

/// Records into `command_buffer`, submits it and waits for the queue to
/// drain.
fn submit_one_shot(
    api: &mut dyn VulkanApi,
    command_buffer: VkHandle,
    record: impl FnOnce(&mut dyn VulkanApi, VkHandle),
) -> Result<(), DeviceError> {
    api.begin_command_buffer(command_buffer, true)
        .check("vkBeginCommandBuffer")?;
    record(&mut *api, command_buffer);
    api.end_command_buffer(command_buffer)
        .check("vkEndCommandBuffer")?;
    let submit = SubmitInfo {
        command_buffer,
        wait_semaphore: None,
        signal_semaphore: None,
    };
    api.queue_submit(&submit, NULL_HANDLE).check("vkQueueSubmit")?;
    api.queue_wait_idle().check("vkQueueWaitIdle")
}

/// Copies `data` into a temporary host-visible buffer and runs `record`
/// with it as the transfer source.
fn upload_via_staging(
    api: &mut dyn VulkanApi,
    memory_types: &[u32],
    command_buffer: VkHandle,
    data: &[u8],
    record: impl FnOnce(&mut dyn VulkanApi, VkHandle, VkHandle),
) -> Result<(), DeviceError> {
    let (staging, memory) = create_bound_buffer(
        api,
        memory_types,
        data.len() as u64,
        vk::BUFFER_USAGE_TRANSFER_SRC,
        vk::MEMORY_PROPERTY_HOST_VISIBLE | vk::MEMORY_PROPERTY_HOST_COHERENT,
    )?;
    let result = write_memory(api, memory, 0, data).and_then(|()| {
        submit_one_shot(api, command_buffer, |api, cb| record(api, cb, staging))
    });
    api.destroy_buffer(staging);
    api.free_memory(memory);
    result
}

fn access_mask(layout: u32) -> u32 {
    match layout {
        vk::IMAGE_LAYOUT_TRANSFER_DST_OPTIMAL => vk::ACCESS_TRANSFER_WRITE,
        vk::IMAGE_LAYOUT_SHADER_READ_ONLY_OPTIMAL => vk::ACCESS_SHADER_READ,
        vk::IMAGE_LAYOUT_COLOR_ATTACHMENT_OPTIMAL => vk::ACCESS_COLOR_ATTACHMENT_WRITE,
        vk::IMAGE_LAYOUT_DEPTH_STENCIL_ATTACHMENT_OPTIMAL => {
            vk::ACCESS_DEPTH_STENCIL_ATTACHMENT_WRITE
        }
        _ => 0,
    }
}

fn layout_transition(
    image: VkHandle,
    subresource_range: ImageSubresourceRange,
    old_layout: u32,
    new_layout: u32,
) -> ImageMemoryBarrier {
    ImageMemoryBarrier {
        image,
        src_access_mask: access_mask(old_layout),
        dst_access_mask: access_mask(new_layout),
        old_layout,
        new_layout,
        subresource_range,
    }
}

fn single_subresource(aspect_mask: u32) -> ImageSubresourceRange {
    ImageSubresourceRange {
        aspect_mask,
        base_mip_level: 0,
        level_count: 1,
        base_array_layer: 0,
        layer_count: 1,
    }
}

/// Reinterprets SPIR-V bytes as words. A trailing partial word is dropped;
/// the shader bridge already rejected misaligned modules.
fn spirv_words(bytes: &[u8]) -> Vec<u32> {
    bytes
        .chunks_exact(4)
        .map(bytemuck::pod_read_unaligned::<u32>)
        .collect()
}

/// The push-descriptor layout of set 0, merged across stages.
fn descriptor_bindings(
    stages: &[ShaderStageInfo],
) -> RenderResult<Vec<DescriptorSetLayoutBinding>> {
    let mut bindings: BTreeMap<u32, DescriptorSetLayoutBinding> = BTreeMap::new();
    for info in stages {
        let stage_flag = conversions::shader_stage(info.stage);
        let reflection = &info.reflection;
        let declared = reflection
            .ubos
            .iter()
            .map(|block| (block.set, block.binding, vk::DESCRIPTOR_TYPE_UNIFORM_BUFFER))
            .chain(
                reflection
                    .ssbos
                    .iter()
                    .map(|block| (block.set, block.binding, vk::DESCRIPTOR_TYPE_STORAGE_BUFFER)),
            )
            .chain(reflection.textures.iter().map(|texture| {
                (
                    texture.set,
                    texture.binding,
                    vk::DESCRIPTOR_TYPE_COMBINED_IMAGE_SAMPLER,
                )
            }));
        for (set, binding, descriptor_type) in declared {
            if set != 0 {
                return Err(RenderError::config(format!(
                    "{:?} stage uses descriptor set {set}; only set 0 is bound",
                    info.stage
                )));
            }
            let entry = bindings.entry(binding).or_insert(DescriptorSetLayoutBinding {
                binding,
                descriptor_type,
                stage_flags: 0,
            });
            if entry.descriptor_type != descriptor_type {
                return Err(RenderError::config(format!(
                    "binding {binding} is declared with conflicting descriptor types"
                )));
            }
            entry.stage_flags |= stage_flag;
        }
    }
    Ok(bindings.into_values().collect())
}

fn destroy_modules(api: &mut dyn VulkanApi, modules: &[(ShaderStage, VkHandle)]) {
    for &(_, module) in modules {
        api.destroy_shader_module(module);
    }
}

fn destroy_views(api: &mut dyn VulkanApi, views: &[VkHandle]) {
    for &view in views {
        api.destroy_image_view(view);
    }
}

fn back_buffer_pass_info(swapchain: &SwapchainState) -> RenderPassCreateInfo {
    RenderPassCreateInfo {
        color_attachments: vec![AttachmentDescription {
            format: conversions::to_native_format(swapchain.color_format, FormatUsage::Attachment),
            layout: vk::IMAGE_LAYOUT_PRESENT_SRC_KHR,
        }],
        depth_stencil_attachment: swapchain.depth_stencil_format.map(|format| {
            AttachmentDescription {
                format: conversions::to_native_format(format, FormatUsage::Attachment),
                layout: vk::IMAGE_LAYOUT_DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
            }
        }),
    }
}

fn destroy_swapchain_images(api: &mut dyn VulkanApi, swapchain: &SwapchainImages) {
    for &framebuffer in &swapchain.framebuffers {
        api.destroy_framebuffer(framebuffer);
    }
    for &view in &swapchain.views {
        api.destroy_image_view(view);
    }
    if let Some(depth) = swapchain.depth {
        api.destroy_image_view(depth.view);
        api.destroy_image(depth.image);
        api.free_memory(depth.memory);
    }
}

/// Creates a swapchain with one view and framebuffer per image, plus a
/// shared depth buffer, and moves every image into its resting layout.
fn create_swapchain_images(
    api: &mut dyn VulkanApi,
    memory_types: &[u32],
    upload: VkHandle,
    surface: VkHandle,
    swapchain: &SwapchainState,
    render_pass: VkHandle,
    old_swapchain: VkHandle,
) -> Result<SwapchainImages, DeviceError> {
    let info = SwapchainCreateInfo {
        surface,
        extent: swapchain.extent,
        format: conversions::to_native_format(swapchain.color_format, FormatUsage::Attachment),
        min_image_count: swapchain.image_count,
        old_swapchain,
    };
    let handle = api
        .create_swapchain(&info)
        .map_err(|result| result.into_device_error("vkCreateSwapchainKHR"))?;
    let mut created = SwapchainImages {
        handle,
        ..SwapchainImages::default()
    };
    match populate_swapchain(api, memory_types, upload, swapchain, render_pass, &mut created) {
        Ok(()) => Ok(created),
        Err(err) => {
            destroy_swapchain_images(api, &created);
            api.destroy_swapchain(handle);
            Err(err)
        }
    }
}

fn populate_swapchain(
    api: &mut dyn VulkanApi,
    memory_types: &[u32],
    upload: VkHandle,
    swapchain: &SwapchainState,
    render_pass: VkHandle,
    created: &mut SwapchainImages,
) -> Result<(), DeviceError> {
    created.images = api
        .get_swapchain_images(created.handle)
        .map_err(|result| result.into_device_error("vkGetSwapchainImagesKHR"))?;
    let color_format = conversions::to_native_format(swapchain.color_format, FormatUsage::Attachment);
    for &image in &created.images {
        let view = api
            .create_image_view(&ImageViewCreateInfo {
                image,
                view_type: vk::IMAGE_VIEW_TYPE_2D,
                format: color_format,
                subresource_range: single_subresource(vk::IMAGE_ASPECT_COLOR),
            })
            .map_err(|result| result.into_device_error("vkCreateImageView"))?;
        created.views.push(view);
    }
    let mut barriers: Vec<ImageMemoryBarrier> = created
        .images
        .iter()
        .map(|&image| {
            layout_transition(
                image,
                single_subresource(vk::IMAGE_ASPECT_COLOR),
                vk::IMAGE_LAYOUT_UNDEFINED,
                vk::IMAGE_LAYOUT_PRESENT_SRC_KHR,
            )
        })
        .collect();

    if let Some(format) = swapchain.depth_stencil_format {
        let native_format = conversions::to_native_format(format, FormatUsage::Attachment);
        let info = ImageCreateInfo {
            flags: 0,
            image_type: vk::IMAGE_TYPE_2D,
            format: native_format,
            extent: Extent3D::new(swapchain.extent.width, swapchain.extent.height, 1),
            mip_levels: 1,
            array_layers: 1,
            usage: vk::IMAGE_USAGE_DEPTH_STENCIL_ATTACHMENT,
        };
        let (image, memory) = create_bound_image(api, memory_types, &info)?;
        let range = single_subresource(conversions::attachment_aspect(format));
        let view = match api.create_image_view(&ImageViewCreateInfo {
            image,
            view_type: vk::IMAGE_VIEW_TYPE_2D,
            format: native_format,
            subresource_range: range,
        }) {
            Ok(view) => view,
            Err(result) => {
                api.destroy_image(image);
                api.free_memory(memory);
                return Err(result.into_device_error("vkCreateImageView"));
            }
        };
        created.depth = Some(ImageAllocation { image, memory, view });
        barriers.push(layout_transition(
            image,
            range,
            vk::IMAGE_LAYOUT_UNDEFINED,
            vk::IMAGE_LAYOUT_DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
        ));
    }

    for &view in &created.views {
        let mut attachments = vec![view];
        attachments.extend(created.depth.map(|depth| depth.view));
        let framebuffer = api
            .create_framebuffer(render_pass, &attachments, swapchain.extent)
            .map_err(|result| result.into_device_error("vkCreateFramebuffer"))?;
        created.framebuffers.push(framebuffer);
    }

    submit_one_shot(api, upload, |api, cb| {
        api.cmd_pipeline_barrier(
            cb,
            vk::PIPELINE_STAGE_TOP_OF_PIPE,
            vk::PIPELINE_STAGE_ALL_COMMANDS,
            &barriers,
        );
    })
}

/// The Vulkan implementation of [`GraphicsDevice`].
///
/// Commands are recorded into one command buffer per swapchain image and
/// submitted by [`present`](GraphicsDevice::present). Fixed-function state
/// is baked into pipelines created lazily at the first draw that needs
/// them; uniform buffers and textures are written with push descriptors.
/// Uploads outside a frame run on a separate command buffer and wait for
/// the queue. Updates made while a frame is recording are copied inside
/// that frame, after the commands already recorded.
///
/// Any failed frame call or out-of-order frame transition loses the device:
/// every later call fails with a device error.
#[derive(Debug)]
pub struct VulkanDevice {
    api: Box<dyn VulkanApi>,
    state: DeviceState,
    bridge: ShaderBridge,
    device_created: bool,
    memory_types: Vec<u32>,
    surface: VkHandle,
    swapchain: SwapchainImages,
    back_buffer_pass: VkHandle,
    command_pool: VkHandle,
    command_buffers: Vec<VkHandle>,
    upload_command_buffer: VkHandle,
    image_available: VkHandle,
    render_finished: VkHandle,
    in_flight: VkHandle,
    frame: FrameSync,
    pipelines: PipelineCache,
    retired: Vec<Retired>,
    target: RenderTarget,
    pass_open: bool,
    /// Staging copies were recorded into the frame's command buffer.
    frame_uploads: bool,
    bindings: Bindings,
    dirty: Dirty,
}

impl VulkanDevice {
    /// Creates the instance, device and swapchain on `surface` and acquires
    /// the first image.
    pub fn new(
        api: Box<dyn VulkanApi>,
        surface: &SurfaceHandle,
        initial_size: Extent2D,
        options: DeviceOptions,
        compiler: Arc<dyn ShaderCompiler>,
    ) -> RenderResult<Self> {
        let state = DeviceState::new(BackendType::Vulkan, initial_size, options.clone())?;
        let mut device = Self {
            api,
            state,
            bridge: ShaderBridge::new(compiler, TargetLanguage::SpirV),
            device_created: false,
            memory_types: Vec::new(),
            surface: NULL_HANDLE,
            swapchain: SwapchainImages::default(),
            back_buffer_pass: NULL_HANDLE,
            command_pool: NULL_HANDLE,
            command_buffers: Vec::new(),
            upload_command_buffer: NULL_HANDLE,
            image_available: NULL_HANDLE,
            render_finished: NULL_HANDLE,
            in_flight: NULL_HANDLE,
            frame: FrameSync::new(),
            pipelines: PipelineCache::default(),
            retired: Vec::new(),
            target: RenderTarget {
                framebuffer: None,
                render_pass: NULL_HANDLE,
                extent: initial_size,
                color_count: 1,
                depth_format: options.depth_stencil_format,
            },
            pass_open: false,
            frame_uploads: false,
            bindings: Bindings::default(),
            dirty: Dirty::ALL,
        };
        // On failure, dropping the half-built device releases what exists.
        device.initialize(surface)?;

        log::info!(
            "VulkanDevice: Created device ({}x{}, {} images, validation: {}, state cache: {})",
            initial_size.width,
            initial_size.height,
            device.state.swapchain.image_count,
            options.debug,
            options.state_cache
        );
        Ok(device)
    }

    fn initialize(&mut self, surface: &SurfaceHandle) -> RenderResult<()> {
        self.api
            .create_instance(self.state.options.debug)
            .map_err(|result| result.into_device_error("vkCreateInstance"))?;
        self.surface = self
            .api
            .create_surface(surface)
            .map_err(|result| result.into_device_error("vkCreateSurfaceKHR"))?;
        self.api
            .create_device(self.surface)
            .map_err(|result| result.into_device_error("vkCreateDevice"))?;
        self.device_created = true;
        self.memory_types = self.api.memory_types();

        self.command_pool = self
            .api
            .create_command_pool()
            .map_err(|result| result.into_device_error("vkCreateCommandPool"))?;
        self.upload_command_buffer = self
            .api
            .allocate_command_buffers(self.command_pool, 1)
            .map_err(|result| result.into_device_error("vkAllocateCommandBuffers"))?
            .into_iter()
            .next()
            .ok_or_else(|| {
                DeviceError::new("vkAllocateCommandBuffers", 0, "no command buffer returned")
            })?;
        self.image_available = self.create_semaphore()?;
        self.render_finished = self.create_semaphore()?;
        self.in_flight = self
            .api
            .create_fence(false)
            .map_err(|result| result.into_device_error("vkCreateFence"))?;

        self.back_buffer_pass = self
            .api
            .create_render_pass(&back_buffer_pass_info(&self.state.swapchain))
            .map_err(|result| result.into_device_error("vkCreateRenderPass"))?;
        self.swapchain = create_swapchain_images(
            self.api.as_mut(),
            &self.memory_types,
            self.upload_command_buffer,
            self.surface,
            &self.state.swapchain,
            self.back_buffer_pass,
            NULL_HANDLE,
        )?;
        self.state.swapchain.image_count = self.swapchain.images.len() as u32;
        self.ensure_command_buffers()?;
        self.target = self.back_buffer_target();
        self.acquire_next_image()
    }

    /// The native driver this device talks to.
    pub fn api(&self) -> &dyn VulkanApi {
        self.api.as_ref()
    }

    /// Where the current frame is in the acquire, record, submit and present
    /// cycle.
    pub fn frame_phase(&self) -> FramePhase {
        self.frame.phase()
    }

    /// Number of pipelines created so far and still alive.
    pub fn pipeline_count(&self) -> usize {
        self.pipelines.len()
    }

    fn create_semaphore(&mut self) -> Result<VkHandle, DeviceError> {
        self.api
            .create_semaphore()
            .map_err(|result| result.into_device_error("vkCreateSemaphore"))
    }

    fn owns(&self, handle: NativeHandle) -> bool {
        if handle.backend() == BackendType::Vulkan {
            true
        } else {
            log::warn!("VulkanDevice: Ignored dispose of a {:?} resource", handle.backend());
            false
        }
    }

    /// Enters the lost state and returns `err` for the caller.
    fn lose(&mut self, err: DeviceError) -> RenderError {
        log::error!("VulkanDevice: Device lost: {err}");
        self.frame.lose();
        err.into()
    }

    /// Frame calls: any failure is fatal.
    fn fatal(&mut self, result: VkResult, operation: &'static str) -> RenderResult<()> {
        if result.is_success() {
            Ok(())
        } else {
            Err(self.lose(result.into_device_error(operation)))
        }
    }

    /// Queue work outside the frame: only a lost device is fatal.
    fn submission_error(&mut self, err: DeviceError) -> RenderError {
        if err.status == VkResult::ERROR_DEVICE_LOST.0 as i64 {
            self.lose(err)
        } else {
            err.into()
        }
    }

    fn submission(&mut self, result: Result<(), DeviceError>) -> RenderResult<()> {
        result.map_err(|err| self.submission_error(err))
    }

    fn advance(
        &mut self,
        step: fn(&mut FrameSync) -> Result<(), DeviceError>,
    ) -> RenderResult<()> {
        match step(&mut self.frame) {
            Ok(()) => Ok(()),
            Err(err) => Err(self.lose(err)),
        }
    }

    fn acquire_next_image(&mut self) -> RenderResult<()> {
        let (result, image_index) = self
            .api
            .acquire_next_image(self.swapchain.handle, self.image_available);
        self.fatal(result, "vkAcquireNextImageKHR")?;
        match self.frame.acquired(image_index) {
            Ok(()) => Ok(()),
            Err(err) => Err(self.lose(err)),
        }
    }

    fn ensure_command_buffers(&mut self) -> RenderResult<()> {
        let needed = self.swapchain.images.len();
        if self.command_buffers.len() < needed {
            let count = (needed - self.command_buffers.len()) as u32;
            let extra = self
                .api
                .allocate_command_buffers(self.command_pool, count)
                .map_err(|result| result.into_device_error("vkAllocateCommandBuffers"))?;
            self.command_buffers.extend(extra);
        }
        Ok(())
    }

    fn current_command_buffer(&self) -> RenderResult<VkHandle> {
        let index = self.frame.image_index();
        self.command_buffers
            .get(index as usize)
            .copied()
            .ok_or_else(|| {
                DeviceError::new(
                    "vkAcquireNextImageKHR",
                    0,
                    format!("image index {index} has no command buffer"),
                )
                .into()
            })
    }

    fn back_buffer_target(&self) -> RenderTarget {
        RenderTarget {
            framebuffer: None,
            render_pass: self.back_buffer_pass,
            extent: self.state.swapchain.extent,
            color_count: 1,
            depth_format: self.state.swapchain.depth_stencil_format,
        }
    }

    /// Starts recording the acquired image's command buffer if the frame has
    /// not started yet.
    fn ensure_recording(&mut self) -> RenderResult<VkHandle> {
        let command_buffer = self.current_command_buffer()?;
        if self.frame.phase() == FramePhase::Recording {
            return Ok(command_buffer);
        }
        let result = self.api.reset_command_buffer(command_buffer);
        self.fatal(result, "vkResetCommandBuffer")?;
        let result = self.api.begin_command_buffer(command_buffer, true);
        self.fatal(result, "vkBeginCommandBuffer")?;
        self.advance(FrameSync::begin_recording)?;
        self.frame_uploads = false;
        self.dirty = Dirty::ALL;
        Ok(command_buffer)
    }

    fn ensure_render_pass(&mut self) -> RenderResult<VkHandle> {
        let command_buffer = self.ensure_recording()?;
        if !self.pass_open {
            let framebuffer = match self.target.framebuffer {
                Some((_, framebuffer)) => framebuffer,
                None => {
                    let index = self.frame.image_index() as usize;
                    self.swapchain.framebuffers.get(index).copied().ok_or_else(|| {
                        RenderError::from(DeviceError::new(
                            "vkCmdBeginRenderPass",
                            0,
                            format!("swapchain image {index} has no framebuffer"),
                        ))
                    })?
                }
            };
            self.api.cmd_begin_render_pass(
                command_buffer,
                self.target.render_pass,
                framebuffer,
                self.target.extent,
            );
            self.pass_open = true;
            self.dirty = Dirty::ALL;
        }
        Ok(command_buffer)
    }

    fn end_render_pass(&mut self) {
        if !self.pass_open {
            return;
        }
        if let Ok(command_buffer) = self.current_command_buffer() {
            self.api.cmd_end_render_pass(command_buffer);
        }
        self.pass_open = false;
    }

    /// Copies `data` through a staging buffer with the commands `record`
    /// emits. Outside a frame the copy is submitted on its own and waited
    /// for. While a frame is recording it goes into the frame's command
    /// buffer between two render passes, so draws recorded before it still
    /// read the old contents.
    fn upload(
        &mut self,
        data: &[u8],
        record: impl FnOnce(&mut dyn VulkanApi, VkHandle, VkHandle),
    ) -> RenderResult<()> {
        if self.frame.phase() != FramePhase::Recording {
            let result = upload_via_staging(
                self.api.as_mut(),
                &self.memory_types,
                self.upload_command_buffer,
                data,
                record,
            );
            return self.submission(result);
        }

        let command_buffer = self.current_command_buffer()?;
        let (staging, memory) = create_bound_buffer(
            self.api.as_mut(),
            &self.memory_types,
            data.len() as u64,
            vk::BUFFER_USAGE_TRANSFER_SRC,
            vk::MEMORY_PROPERTY_HOST_VISIBLE | vk::MEMORY_PROPERTY_HOST_COHERENT,
        )?;
        if let Err(err) = write_memory(self.api.as_mut(), memory, 0, data) {
            self.api.destroy_buffer(staging);
            self.api.free_memory(memory);
            return Err(err.into());
        }

        self.end_render_pass();
        self.api.cmd_pipeline_barrier(
            command_buffer,
            vk::PIPELINE_STAGE_ALL_COMMANDS,
            vk::PIPELINE_STAGE_TRANSFER,
            &[],
        );
        record(self.api.as_mut(), command_buffer, staging);
        self.api.cmd_pipeline_barrier(
            command_buffer,
            vk::PIPELINE_STAGE_TRANSFER,
            vk::PIPELINE_STAGE_ALL_COMMANDS,
            &[],
        );
        // The staging buffer is read when the frame executes.
        self.retire(Retired::Buffer(staging));
        self.retire(Retired::Memory(memory));
        self.frame_uploads = true;
        log::trace!("VulkanDevice: Recorded a {} byte upload into the frame", data.len());
        Ok(())
    }

    /// Submits the frame being recorded without presenting it. Used when a
    /// resize abandons a frame that already holds uploads.
    fn submit_abandoned_frame(&mut self) -> RenderResult<()> {
        self.end_render_pass();
        let command_buffer = self.current_command_buffer()?;
        let result = self.api.end_command_buffer(command_buffer);
        self.fatal(result, "vkEndCommandBuffer")?;
        let submit = SubmitInfo {
            command_buffer,
            wait_semaphore: Some((self.image_available, vk::PIPELINE_STAGE_TRANSFER)),
            signal_semaphore: None,
        };
        let result = self.api.queue_submit(&submit, NULL_HANDLE);
        self.fatal(result, "vkQueueSubmit")?;
        self.frame_uploads = false;
        Ok(())
    }

    /// Destroys `object` now, or after the frame that may use it completes.
    fn retire(&mut self, object: Retired) {
        if self.frame.phase() == FramePhase::Recording {
            self.retired.push(object);
        } else {
            object.destroy(self.api.as_mut());
        }
    }

    fn collect_retired(&mut self) {
        for object in std::mem::take(&mut self.retired) {
            object.destroy(self.api.as_mut());
        }
    }

    fn require_graphics(&self) -> RenderResult<()> {
        match &self.bindings.shader {
            Some(shader) if !shader.compute => Ok(()),
            Some(_) => Err(RenderError::config(
                "a compute shader is bound; draws need a graphics shader",
            )),
            None => Err(RenderError::config("no shader is bound")),
        }
    }

    fn graphics_pipeline(&mut self) -> RenderResult<VkHandle> {
        let Some(shader) = &self.bindings.shader else {
            return Err(RenderError::config("no shader is bound"));
        };
        let key = PipelineKey::Graphics(GraphicsKey {
            shader: shader.id,
            vertex_inputs: self
                .bindings
                .vertex_buffers
                .iter()
                .map(|(&slot, bound)| VertexInputKey {
                    slot,
                    layout: bound.layout,
                    stride: bound.stride,
                })
                .collect(),
            topology: self.state.topology,
            rasterizer: self.bindings.rasterizer,
            blend: self.bindings.blend,
            depth_stencil: self.bindings.depth_stencil,
            render_pass: self.target.render_pass,
        });
        if let Some(pipeline) = self.pipelines.get(&key) {
            return Ok(pipeline);
        }

        let info = GraphicsPipelineCreateInfo {
            stages: shader.stages.clone(),
            vertex_bindings: self
                .bindings
                .vertex_buffers
                .iter()
                .map(|(&slot, bound)| VertexInputBindingDescription {
                    binding: slot,
                    stride: bound.stride,
                    input_rate: bound.rate.into_vulkan(),
                })
                .collect(),
            vertex_attributes: self
                .bindings
                .vertex_buffers
                .iter()
                .flat_map(|(&slot, bound)| {
                    bound.attributes.iter().map(move |&(location, attribute)| {
                        VertexInputAttributeDescription {
                            location,
                            binding: slot,
                            format: attribute.format.into_vulkan(),
                            offset: attribute.offset,
                        }
                    })
                })
                .collect(),
            topology: self.state.topology.into_vulkan(),
            rasterization: (&self.bindings.rasterizer).into_vulkan(),
            depth_stencil: (&self.bindings.depth_stencil).into_vulkan(),
            color_blend_attachments: vec![
                (&self.bindings.blend).into_vulkan();
                self.target.color_count as usize
            ],
            dynamic_states: vec![
                vk::DYNAMIC_STATE_VIEWPORT,
                vk::DYNAMIC_STATE_SCISSOR,
                vk::DYNAMIC_STATE_BLEND_CONSTANTS,
                vk::DYNAMIC_STATE_STENCIL_REFERENCE,
            ],
            layout: shader.layout,
            render_pass: self.target.render_pass,
        };
        let pipeline = self
            .api
            .create_graphics_pipeline(&info)
            .map_err(|result| result.into_device_error("vkCreateGraphicsPipelines"))?;
        log::debug!(
            "VulkanDevice: Created graphics pipeline for shader {:?} ({} cached)",
            shader.id,
            self.pipelines.len() + 1
        );
        self.pipelines.insert(key, pipeline);
        Ok(pipeline)
    }

    fn compute_pipeline(&mut self) -> RenderResult<VkHandle> {
        let Some(shader) = &self.bindings.shader else {
            return Err(RenderError::config("no shader is bound"));
        };
        let key = PipelineKey::Compute(shader.id);
        if let Some(pipeline) = self.pipelines.get(&key) {
            return Ok(pipeline);
        }
        let stage = shader
            .stages
            .first()
            .cloned()
            .ok_or_else(|| RenderError::config("compute shader has no stage"))?;
        let info = ComputePipelineCreateInfo {
            stage,
            layout: shader.layout,
        };
        let pipeline = self
            .api
            .create_compute_pipeline(&info)
            .map_err(|result| result.into_device_error("vkCreateComputePipelines"))?;
        log::debug!("VulkanDevice: Created compute pipeline for shader {:?}", shader.id);
        self.pipelines.insert(key, pipeline);
        Ok(pipeline)
    }

    fn push_descriptors(&mut self, command_buffer: VkHandle, bind_point: u32) {
        let Some(shader) = &self.bindings.shader else {
            return;
        };
        let writes: Vec<DescriptorWrite> = self
            .bindings
            .descriptors
            .values()
            .filter(|write| shader.bindings.contains(&write.binding()))
            .copied()
            .collect();
        if !writes.is_empty() {
            self.api
                .cmd_push_descriptor_set(command_buffer, bind_point, shader.layout, 0, &writes);
        }
    }

    /// Records every dirty piece of bound state ahead of a draw.
    fn flush_graphics(&mut self, command_buffer: VkHandle, indexed: bool) -> RenderResult<()> {
        if self.dirty.contains(Dirty::PIPELINE) {
            let pipeline = self.graphics_pipeline()?;
            self.api
                .cmd_bind_pipeline(command_buffer, vk::PIPELINE_BIND_POINT_GRAPHICS, pipeline);
            self.dirty.remove(Dirty::PIPELINE);
        }
        if self.dirty.contains(Dirty::VERTEX_BUFFERS) {
            for (&slot, bound) in &self.bindings.vertex_buffers {
                self.api
                    .cmd_bind_vertex_buffer(command_buffer, slot, bound.buffer, 0);
            }
            self.dirty.remove(Dirty::VERTEX_BUFFERS);
        }
        if indexed && self.dirty.contains(Dirty::INDEX_BUFFER) {
            if let Some((buffer, format)) = self.bindings.index_buffer {
                self.api
                    .cmd_bind_index_buffer(command_buffer, buffer, 0, format.into_vulkan());
            }
            self.dirty.remove(Dirty::INDEX_BUFFER);
        }
        if self.dirty.contains(Dirty::DESCRIPTORS) {
            self.push_descriptors(command_buffer, vk::PIPELINE_BIND_POINT_GRAPHICS);
            self.dirty.remove(Dirty::DESCRIPTORS);
        }
        if self.dirty.contains(Dirty::DYNAMIC) {
            let extent = self.target.extent;
            self.api.cmd_set_viewport(command_buffer, extent);
            self.api.cmd_set_scissor(command_buffer, extent);
            self.api
                .cmd_set_stencil_reference(command_buffer, self.bindings.stencil_reference);
            self.api
                .cmd_set_blend_constants(command_buffer, self.bindings.blend.constant);
            self.dirty.remove(Dirty::DYNAMIC);
        }
        Ok(())
    }

    fn prepare_draw(&mut self, operation: &'static str, indexed: bool) -> RenderResult<VkHandle> {
        self.frame.ensure_alive(operation)?;
        self.require_graphics()?;
        if indexed && self.bindings.index_buffer.is_none() {
            return Err(RenderError::config("no index buffer is bound"));
        }
        let command_buffer = self.ensure_render_pass()?;
        self.flush_graphics(command_buffer, indexed)?;
        Ok(command_buffer)
    }

    /// Releases a state object. Fixed-function states live in pipelines and
    /// carry the null handle; only `sampler` states own a native object.
    fn dispose_state<D>(&mut self, state: &mut StateObject<D>, sampler: bool) {
        if let Some(handle) = state.native() {
            if !self.owns(handle) {
                return;
            }
        }
        if let Some(handle) = state.take_native() {
            if sampler && handle.raw() != NULL_HANDLE {
                self.retire(Retired::Sampler(handle.raw()));
            }
            self.state.release(ResourceKind::StateObject);
        }
    }

    fn register_state(&mut self) -> RenderResult<ResourceId> {
        self.frame.ensure_alive("vkCreateGraphicsPipelines")?;
        Ok(self.state.register(ResourceKind::StateObject))
    }
}

impl GraphicsDevice for VulkanDevice {
    fn backend(&self) -> BackendType {
        BackendType::Vulkan
    }

    fn swapchain(&self) -> SwapchainState {
        self.state.swapchain
    }

    fn stats(&self) -> DeviceStats {
        self.state.stats()
    }

    fn live_resources(&self) -> ResourceCounters {
        self.state.counters()
    }

    fn create_buffer(
        &mut self,
        desc: &BufferDescriptor,
        data: Option<&[u8]>,
    ) -> RenderResult<Buffer> {
        self.frame.ensure_alive("vkCreateBuffer")?;
        desc.validate(data)?;

        let properties = if desc.dynamic {
            vk::MEMORY_PROPERTY_HOST_VISIBLE | vk::MEMORY_PROPERTY_HOST_COHERENT
        } else {
            vk::MEMORY_PROPERTY_DEVICE_LOCAL
        };
        let (buffer, memory) = create_bound_buffer(
            self.api.as_mut(),
            &self.memory_types,
            desc.size,
            conversions::buffer_usage(desc),
            properties,
        )?;

        if let Some(data) = data {
            let result = if desc.dynamic {
                write_memory(self.api.as_mut(), memory, 0, data)
            } else {
                upload_via_staging(
                    self.api.as_mut(),
                    &self.memory_types,
                    self.upload_command_buffer,
                    data,
                    |api, cb, staging| {
                        api.cmd_copy_buffer(
                            cb,
                            staging,
                            buffer,
                            &[BufferCopy {
                                src_offset: 0,
                                dst_offset: 0,
                                size: data.len() as u64,
                            }],
                        );
                    },
                )
            };
            if let Err(err) = result {
                self.api.destroy_buffer(buffer);
                self.api.free_memory(memory);
                return Err(self.submission_error(err));
            }
        }

        let id = self.state.register(ResourceKind::Buffer);
        log::debug!(
            "VulkanDevice: Created {:?} buffer {id:?} ({} bytes, dynamic: {})",
            desc.kind,
            desc.size,
            desc.dynamic
        );
        Ok(Buffer::new(
            id,
            desc.clone(),
            BufferNative {
                buffer: NativeHandle::Vulkan(buffer),
                memory: Some(NativeHandle::Vulkan(memory)),
            },
        ))
    }

    fn create_texture(
        &mut self,
        desc: &TextureDescriptor,
        data: Option<&[u8]>,
    ) -> RenderResult<Texture> {
        self.frame.ensure_alive("vkCreateImage")?;
        let desc = desc.validate()?;
        check_initial_data(&desc, data)?;

        let format = conversions::to_native_format(desc.format, FormatUsage::ShaderRead);
        let (depth, array_layers) = match desc.texture_type {
            TextureType::D3 => (desc.depth, 1),
            _ => (1, desc.layer_count()),
        };
        let info = ImageCreateInfo {
            flags: if desc.texture_type == TextureType::Cube {
                vk::IMAGE_CREATE_CUBE_COMPATIBLE
            } else {
                0
            },
            image_type: conversions::image_type(desc.texture_type),
            format,
            extent: Extent3D::new(desc.width, desc.height, depth),
            mip_levels: desc.mip_levels,
            array_layers,
            usage: conversions::image_usage(desc.usage),
        };
        let (image, memory) = create_bound_image(self.api.as_mut(), &self.memory_types, &info)?;

        let resting = conversions::resting_layout(&desc);
        let full_range = ImageSubresourceRange {
            aspect_mask: conversions::attachment_aspect(desc.format),
            base_mip_level: 0,
            level_count: desc.mip_levels,
            base_array_layer: 0,
            layer_count: array_layers,
        };
        let result = match data {
            Some(data) => {
                let copy_aspect = conversions::sampled_aspect(desc.format);
                let regions: Vec<BufferImageCopy> = initial_data_layout(&desc)
                    .into_iter()
                    .filter(|upload| {
                        if upload.skip {
                            log::debug!(
                                "VulkanDevice: Skipped sub-block upload of mip {} layer {}",
                                upload.mip_level,
                                upload.array_layer
                            );
                        }
                        !upload.skip
                    })
                    .map(|upload| BufferImageCopy {
                        buffer_offset: upload.offset as u64,
                        aspect_mask: copy_aspect,
                        mip_level: upload.mip_level,
                        base_array_layer: upload.array_layer,
                        image_offset: Origin3D::ZERO,
                        image_extent: upload.extent,
                    })
                    .collect();
                upload_via_staging(
                    self.api.as_mut(),
                    &self.memory_types,
                    self.upload_command_buffer,
                    data,
                    |api, cb, staging| {
                        api.cmd_pipeline_barrier(
                            cb,
                            vk::PIPELINE_STAGE_TOP_OF_PIPE,
                            vk::PIPELINE_STAGE_TRANSFER,
                            &[layout_transition(
                                image,
                                full_range,
                                vk::IMAGE_LAYOUT_UNDEFINED,
                                vk::IMAGE_LAYOUT_TRANSFER_DST_OPTIMAL,
                            )],
                        );
                        if !regions.is_empty() {
                            api.cmd_copy_buffer_to_image(
                                cb,
                                staging,
                                image,
                                vk::IMAGE_LAYOUT_TRANSFER_DST_OPTIMAL,
                                &regions,
                            );
                        }
                        api.cmd_pipeline_barrier(
                            cb,
                            vk::PIPELINE_STAGE_TRANSFER,
                            vk::PIPELINE_STAGE_ALL_COMMANDS,
                            &[layout_transition(
                                image,
                                full_range,
                                vk::IMAGE_LAYOUT_TRANSFER_DST_OPTIMAL,
                                resting,
                            )],
                        );
                    },
                )
            }
            None => submit_one_shot(self.api.as_mut(), self.upload_command_buffer, |api, cb| {
                api.cmd_pipeline_barrier(
                    cb,
                    vk::PIPELINE_STAGE_TOP_OF_PIPE,
                    vk::PIPELINE_STAGE_ALL_COMMANDS,
                    &[layout_transition(image, full_range, vk::IMAGE_LAYOUT_UNDEFINED, resting)],
                );
            }),
        };
        if let Err(err) = result {
            self.api.destroy_image(image);
            self.api.free_memory(memory);
            return Err(self.submission_error(err));
        }

        let shader_view = if desc.usage.contains(TextureUsage::SAMPLED) {
            let view_info = ImageViewCreateInfo {
                image,
                view_type: conversions::view_type(&desc),
                format,
                subresource_range: ImageSubresourceRange {
                    aspect_mask: conversions::sampled_aspect(desc.format),
                    ..full_range
                },
            };
            match self.api.create_image_view(&view_info) {
                Ok(view) => Some(NativeHandle::Vulkan(view)),
                Err(result) => {
                    self.api.destroy_image(image);
                    self.api.free_memory(memory);
                    return Err(result.into_device_error("vkCreateImageView").into());
                }
            }
        } else {
            None
        };

        let id = self.state.register(ResourceKind::Texture);
        log::debug!(
            "VulkanDevice: Created {:?} texture {id:?} ({}x{}x{}, {} mips, {:?} as {:?})",
            desc.texture_type,
            desc.width,
            desc.height,
            desc.depth,
            desc.mip_levels,
            desc.format,
            format
        );
        Ok(Texture::new(
            id,
            desc,
            TextureNative {
                storage: NativeHandle::Vulkan(image),
                shader_view,
                memory: Some(NativeHandle::Vulkan(memory)),
            },
        ))
    }

    fn create_shader(
        &mut self,
        stages: &[ShaderStageDescriptor<'_>],
        specialization: &[SpecializationConstant],
    ) -> RenderResult<Shader> {
        self.frame.ensure_alive("vkCreateShaderModule")?;
        validate_stages(stages)?;
        let bridged = stages
            .iter()
            .map(|stage| self.bridge.translate(stage, specialization))
            .collect::<Result<Vec<_>, _>>()?;
        let (infos, codes): (Vec<ShaderStageInfo>, Vec<ShaderCode>) = bridged
            .into_iter()
            .map(|stage| (stage.info, stage.code))
            .unzip();
        let set_bindings = descriptor_bindings(&infos)?;

        let mut modules: Vec<(ShaderStage, VkHandle)> = Vec::with_capacity(infos.len());
        for (info, code) in infos.iter().zip(&codes) {
            let ShaderCode::Binary(bytes) = code else {
                destroy_modules(self.api.as_mut(), &modules);
                return Err(RenderError::config("the Vulkan backend needs SPIR-V binaries"));
            };
            match self.api.create_shader_module(&spirv_words(bytes)) {
                Ok(module) => modules.push((info.stage, module)),
                Err(result) => {
                    destroy_modules(self.api.as_mut(), &modules);
                    return Err(ShaderError::NativeCompilation {
                        stage: info.stage,
                        diagnostics: format!("vkCreateShaderModule returned {result:?}"),
                    }
                    .into());
                }
            }
        }

        let set_layout = match self.api.create_push_descriptor_set_layout(&set_bindings) {
            Ok(layout) => layout,
            Err(result) => {
                destroy_modules(self.api.as_mut(), &modules);
                return Err(result.into_device_error("vkCreateDescriptorSetLayout").into());
            }
        };
        let layout = match self.api.create_pipeline_layout(set_layout) {
            Ok(layout) => layout,
            Err(result) => {
                self.api.destroy_descriptor_set_layout(set_layout);
                destroy_modules(self.api.as_mut(), &modules);
                return Err(result.into_device_error("vkCreatePipelineLayout").into());
            }
        };

        let id = self.state.register(ResourceKind::Shader);
        log::debug!(
            "VulkanDevice: Created shader {id:?} ({} stages, {} bindings)",
            modules.len(),
            set_bindings.len()
        );
        Ok(Shader::new(
            id,
            infos,
            specialization.to_vec(),
            ShaderNative {
                program: Some(NativeHandle::Vulkan(layout)),
                set_layout: Some(NativeHandle::Vulkan(set_layout)),
                stages: modules
                    .into_iter()
                    .map(|(stage, module)| (stage, NativeHandle::Vulkan(module)))
                    .collect(),
            },
        ))
    }

    fn create_input_layout(&mut self, attributes: &[VertexAttribute]) -> RenderResult<InputLayout> {
        self.frame.ensure_alive("vkCreateGraphicsPipelines")?;
        validate_attributes(attributes)?;
        if let Some(attribute) = attributes
            .iter()
            .find(|attribute| attribute.buffer_slot >= MAX_VERTEX_BINDINGS)
        {
            return Err(RenderError::config(format!(
                "vertex buffer slot {} exceeds the limit of {MAX_VERTEX_BINDINGS}",
                attribute.buffer_slot
            )));
        }
        // Vertex input is baked into pipelines; the layout is only a record.
        let id = self.state.register(ResourceKind::InputLayout);
        log::debug!("VulkanDevice: Created input layout {id:?} ({} attributes)", attributes.len());
        Ok(InputLayout::new(id, attributes.to_vec(), NativeHandle::Vulkan(NULL_HANDLE)))
    }

    fn create_blend_state(&mut self, desc: &BlendDescriptor) -> RenderResult<BlendState> {
        let id = self.register_state()?;
        Ok(BlendState::new(id, *desc, NativeHandle::Vulkan(NULL_HANDLE)))
    }

    fn create_depth_stencil_state(
        &mut self,
        desc: &DepthStencilDescriptor,
    ) -> RenderResult<DepthStencilState> {
        let id = self.register_state()?;
        Ok(DepthStencilState::new(id, *desc, NativeHandle::Vulkan(NULL_HANDLE)))
    }

    fn create_rasterizer_state(
        &mut self,
        desc: &RasterizerDescriptor,
    ) -> RenderResult<RasterizerState> {
        let id = self.register_state()?;
        Ok(RasterizerState::new(id, *desc, NativeHandle::Vulkan(NULL_HANDLE)))
    }

    fn create_sampler_state(&mut self, desc: &SamplerDescriptor) -> RenderResult<SamplerState> {
        self.frame.ensure_alive("vkCreateSampler")?;
        desc.validate()?;
        let sampler = self
            .api
            .create_sampler(&desc.into_vulkan())
            .map_err(|result| result.into_device_error("vkCreateSampler"))?;
        let id = self.state.register(ResourceKind::StateObject);
        Ok(SamplerState::new(id, *desc, NativeHandle::Vulkan(sampler)))
    }

    fn create_framebuffer(
        &mut self,
        attachments: &[FramebufferAttachment<'_>],
    ) -> RenderResult<Framebuffer> {
        self.frame.ensure_alive("vkCreateFramebuffer")?;
        let layout = FramebufferLayout::plan(attachments)?;
        // Colors first, in order, then the depth attachment.
        let ordered = attachments
            .iter()
            .filter(|a| !a.texture.desc().format.is_depth())
            .chain(attachments.iter().filter(|a| a.texture.desc().format.is_depth()));
        let mut resolved = Vec::with_capacity(attachments.len());
        for attachment in ordered {
            let native = alive(attachment.texture.native(), "texture", attachment.texture.id())?;
            resolved.push((self.state.raw(native.storage)?, attachment));
        }

        let mut views = Vec::with_capacity(resolved.len());
        let mut pass = RenderPassCreateInfo {
            color_attachments: Vec::new(),
            depth_stencil_attachment: None,
        };
        for (image, attachment) in resolved {
            let desc = attachment.texture.desc();
            let format = conversions::to_native_format(desc.format, FormatUsage::Attachment);
            let view_info = ImageViewCreateInfo {
                image,
                view_type: conversions::attachment_view_type(desc),
                format,
                subresource_range: ImageSubresourceRange {
                    aspect_mask: conversions::attachment_aspect(desc.format),
                    base_mip_level: attachment.mip_level,
                    level_count: 1,
                    base_array_layer: attachment.array_layer,
                    layer_count: 1,
                },
            };
            match self.api.create_image_view(&view_info) {
                Ok(view) => views.push(view),
                Err(result) => {
                    destroy_views(self.api.as_mut(), &views);
                    return Err(result.into_device_error("vkCreateImageView").into());
                }
            }
            let description = AttachmentDescription {
                format,
                layout: conversions::resting_layout(desc),
            };
            if desc.format.is_depth() {
                pass.depth_stencil_attachment = Some(description);
            } else {
                pass.color_attachments.push(description);
            }
        }

        let render_pass = match self.api.create_render_pass(&pass) {
            Ok(render_pass) => render_pass,
            Err(result) => {
                destroy_views(self.api.as_mut(), &views);
                return Err(result.into_device_error("vkCreateRenderPass").into());
            }
        };
        let framebuffer = match self.api.create_framebuffer(render_pass, &views, layout.extent) {
            Ok(framebuffer) => framebuffer,
            Err(result) => {
                self.api.destroy_render_pass(render_pass);
                destroy_views(self.api.as_mut(), &views);
                return Err(result.into_device_error("vkCreateFramebuffer").into());
            }
        };

        let id = self.state.register(ResourceKind::Framebuffer);
        log::debug!(
            "VulkanDevice: Created framebuffer {id:?} ({} color, depth: {})",
            layout.colors.len(),
            layout.depth_stencil.is_some()
        );
        Ok(Framebuffer::new(
            id,
            layout,
            FramebufferNative {
                framebuffer: Some(NativeHandle::Vulkan(framebuffer)),
                render_pass: Some(NativeHandle::Vulkan(render_pass)),
                views: views.into_iter().map(NativeHandle::Vulkan).collect(),
            },
        ))
    }

    fn update_buffer(&mut self, buffer: &Buffer, offset: u64, data: &[u8]) -> RenderResult<()> {
        self.frame.ensure_alive("vkCmdCopyBuffer")?;
        let native = alive(buffer.native(), "buffer", buffer.id())?;
        let target = self.state.raw(native.buffer)?;
        let memory = native
            .memory
            .ok_or_else(|| RenderError::config(format!("buffer {:?} has no memory", buffer.id())))?;
        let memory = self.state.raw(memory)?;
        let desc = buffer.desc();
        desc.validate_range(offset, data.len())?;
        if self.state.is_mapped(buffer.id()) {
            return Err(RenderError::config(format!(
                "buffer {:?} is mapped and cannot be updated",
                buffer.id()
            )));
        }
        if data.is_empty() {
            return Ok(());
        }

        if desc.dynamic {
            let result = write_memory(self.api.as_mut(), memory, offset, data);
            return self.submission(result);
        }
        self.upload(data, |api, cb, staging| {
            api.cmd_copy_buffer(
                cb,
                staging,
                target,
                &[BufferCopy {
                    src_offset: 0,
                    dst_offset: offset,
                    size: data.len() as u64,
                }],
            );
        })
    }

    fn map_buffer(&mut self, buffer: &Buffer) -> RenderResult<MappedResource> {
        self.frame.ensure_alive("vkMapMemory")?;
        let native = alive(buffer.native(), "buffer", buffer.id())?;
        let memory = native
            .memory
            .ok_or_else(|| RenderError::config(format!("buffer {:?} has no memory", buffer.id())))?;
        let memory = self.state.raw(memory)?;
        if !buffer.desc().dynamic {
            return Err(RenderError::config(format!(
                "buffer {:?} is not dynamic and cannot be mapped",
                buffer.id()
            )));
        }
        self.state.begin_map(buffer)?;

        let size = buffer.desc().size;
        match self.api.map_memory(memory, 0, size) {
            // SAFETY: the host-visible allocation stays mapped for `size`
            // bytes until `vkUnmapMemory`, which only `unmap_buffer` and
            // `dispose_buffer` issue.
            Ok(ptr) => Ok(unsafe { MappedResource::new(ptr, size as usize) }),
            Err(result) => {
                self.state.end_map(buffer.id());
                Err(result.into_device_error("vkMapMemory").into())
            }
        }
    }

    fn unmap_buffer(&mut self, buffer: &Buffer) -> RenderResult<()> {
        let native = alive(buffer.native(), "buffer", buffer.id())?;
        let memory = native
            .memory
            .ok_or_else(|| RenderError::config(format!("buffer {:?} has no memory", buffer.id())))?;
        let memory = self.state.raw(memory)?;
        if !self.state.end_map(buffer.id()) {
            log::warn!("VulkanDevice: Ignored unmap of buffer {:?}, it is not mapped", buffer.id());
            return Ok(());
        }
        self.api.unmap_memory(memory);
        Ok(())
    }

    fn update_texture(
        &mut self,
        texture: &Texture,
        region: &TextureRegion,
        data: &[u8],
    ) -> RenderResult<()> {
        self.frame.ensure_alive("vkCmdCopyBufferToImage")?;
        let native = alive(texture.native(), "texture", texture.id())?;
        let image = self.state.raw(native.storage)?;
        let desc = texture.desc();
        region.validate(desc, data.len())?;
        if is_sub_block_upload(desc.format, region.size.width, region.size.height) {
            log::debug!("VulkanDevice: Skipped sub-block update of texture {:?}", texture.id());
            return Ok(());
        }

        let resting = conversions::resting_layout(desc);
        let range = ImageSubresourceRange {
            aspect_mask: conversions::attachment_aspect(desc.format),
            base_mip_level: region.mip_level,
            level_count: 1,
            base_array_layer: region.array_layer,
            layer_count: 1,
        };
        let copy = BufferImageCopy {
            buffer_offset: 0,
            aspect_mask: conversions::sampled_aspect(desc.format),
            mip_level: region.mip_level,
            base_array_layer: region.array_layer,
            image_offset: region.origin,
            image_extent: region.size,
        };
        self.upload(data, |api, cb, staging| {
            let to_transfer =
                layout_transition(image, range, resting, vk::IMAGE_LAYOUT_TRANSFER_DST_OPTIMAL);
            api.cmd_pipeline_barrier(
                cb,
                vk::PIPELINE_STAGE_ALL_COMMANDS,
                vk::PIPELINE_STAGE_TRANSFER,
                &[to_transfer],
            );
            api.cmd_copy_buffer_to_image(
                cb,
                staging,
                image,
                vk::IMAGE_LAYOUT_TRANSFER_DST_OPTIMAL,
                &[copy],
            );
            let to_resting =
                layout_transition(image, range, vk::IMAGE_LAYOUT_TRANSFER_DST_OPTIMAL, resting);
            api.cmd_pipeline_barrier(
                cb,
                vk::PIPELINE_STAGE_TRANSFER,
                vk::PIPELINE_STAGE_ALL_COMMANDS,
                &[to_resting],
            );
        })
    }

    fn dispose_buffer(&mut self, buffer: &mut Buffer) {
        if let Some(native) = buffer.native() {
            if !self.owns(native.buffer) {
                return;
            }
        }
        let Some(native) = buffer.take_native() else {
            return;
        };
        let memory = native.memory.map_or(NULL_HANDLE, |memory| memory.raw());
        if self.state.end_map(buffer.id()) && memory != NULL_HANDLE {
            self.api.unmap_memory(memory);
        }
        self.retire(Retired::Buffer(native.buffer.raw()));
        self.retire(Retired::Memory(memory));
        self.state.release(ResourceKind::Buffer);
        log::debug!("VulkanDevice: Destroyed buffer with ID: {:?}", buffer.id());
    }

    fn dispose_texture(&mut self, texture: &mut Texture) {
        if let Some(native) = texture.native() {
            if !self.owns(native.storage) {
                return;
            }
        }
        let Some(native) = texture.take_native() else {
            return;
        };
        if let Some(view) = native.shader_view {
            self.retire(Retired::ImageView(view.raw()));
        }
        self.retire(Retired::Image(native.storage.raw()));
        if let Some(memory) = native.memory {
            self.retire(Retired::Memory(memory.raw()));
        }
        self.state.release(ResourceKind::Texture);
        log::debug!("VulkanDevice: Destroyed texture with ID: {:?}", texture.id());
    }

    fn dispose_shader(&mut self, shader: &mut Shader) {
        let Some(native) = shader.take_native() else {
            return;
        };
        if self
            .bindings
            .shader
            .as_ref()
            .is_some_and(|bound| bound.id == shader.id())
        {
            self.bindings.shader = None;
        }
        for pipeline in self.pipelines.evict_shader(shader.id()) {
            self.retire(Retired::Pipeline(pipeline));
        }
        if let Some(layout) = native.program {
            self.retire(Retired::PipelineLayout(layout.raw()));
        }
        if let Some(set_layout) = native.set_layout {
            self.retire(Retired::DescriptorSetLayout(set_layout.raw()));
        }
        for (_, module) in native.stages {
            self.retire(Retired::ShaderModule(module.raw()));
        }
        self.state.release(ResourceKind::Shader);
        log::debug!("VulkanDevice: Destroyed shader with ID: {:?}", shader.id());
    }

    fn dispose_input_layout(&mut self, layout: &mut InputLayout) {
        if let Some(handle) = layout.native() {
            if !self.owns(handle) {
                return;
            }
        }
        if layout.take_native().is_some() {
            self.state.release(ResourceKind::InputLayout);
        }
    }

    fn dispose_blend_state(&mut self, state: &mut BlendState) {
        self.dispose_state(state, false);
    }

    fn dispose_depth_stencil_state(&mut self, state: &mut DepthStencilState) {
        self.dispose_state(state, false);
    }

    fn dispose_rasterizer_state(&mut self, state: &mut RasterizerState) {
        self.dispose_state(state, false);
    }

    fn dispose_sampler_state(&mut self, state: &mut SamplerState) {
        self.dispose_state(state, true);
    }

    fn dispose_framebuffer(&mut self, framebuffer: &mut Framebuffer) {
        let Some(native) = framebuffer.take_native() else {
            return;
        };
        if matches!(self.target.framebuffer, Some((id, _)) if id == framebuffer.id()) {
            self.end_render_pass();
            self.target = self.back_buffer_target();
            self.state.cache.invalidate_all();
            self.dirty = Dirty::ALL;
        }
        if let Some(render_pass) = native.render_pass {
            for pipeline in self.pipelines.evict_render_pass(render_pass.raw()) {
                self.retire(Retired::Pipeline(pipeline));
            }
        }
        if let Some(handle) = native.framebuffer {
            self.retire(Retired::Framebuffer(handle.raw()));
        }
        if let Some(render_pass) = native.render_pass {
            self.retire(Retired::RenderPass(render_pass.raw()));
        }
        for view in native.views {
            self.retire(Retired::ImageView(view.raw()));
        }
        self.state.release(ResourceKind::Framebuffer);
        log::debug!("VulkanDevice: Destroyed framebuffer with ID: {:?}", framebuffer.id());
    }

    fn set_shader(&mut self, shader: &Shader) -> RenderResult<()> {
        self.frame.ensure_alive("vkCmdBindPipeline")?;
        let native = alive(shader.native(), "shader", shader.id())?;
        let program = native
            .program
            .ok_or_else(|| RenderError::config(format!("shader {:?} has no pipeline layout", shader.id())))?;
        let layout = self.state.raw(program)?;
        let specialization = specialization_info(shader.specialization());
        let mut stages = Vec::with_capacity(shader.stages().len());
        for info in shader.stages() {
            let module = native.stage(info.stage).ok_or_else(|| {
                RenderError::config(format!("shader {:?} lost its {:?} module", shader.id(), info.stage))
            })?;
            stages.push(PipelineShaderStageCreateInfo {
                stage: conversions::shader_stage(info.stage),
                module: self.state.raw(module)?,
                name: info.entry_point.clone(),
                specialization_info: specialization.clone(),
            });
        }
        let bindings = descriptor_bindings(shader.stages())?
            .into_iter()
            .map(|binding| binding.binding)
            .collect();

        if self.state.cache.set_shader(shader.id()) {
            self.bindings.shader = Some(BoundShader {
                id: shader.id(),
                layout,
                stages,
                compute: shader.is_compute(),
                bindings,
            });
            self.dirty.insert(Dirty::PIPELINE | Dirty::DESCRIPTORS);
        }
        Ok(())
    }

    fn set_vertex_buffer(
        &mut self,
        slot: u32,
        buffer: &Buffer,
        stride: u32,
        layout: &InputLayout,
    ) -> RenderResult<()> {
        self.frame.ensure_alive("vkCmdBindVertexBuffers")?;
        let native = alive(buffer.native(), "buffer", buffer.id())?;
        let handle = self.state.raw(native.buffer)?;
        let layout_handle = alive(layout.native(), "input layout", layout.id())?;
        self.state.raw(layout_handle)?;
        if buffer.desc().kind != BufferKind::Vertex {
            return Err(RenderError::config(format!(
                "{:?} buffer bound as a vertex buffer",
                buffer.desc().kind
            )));
        }
        if slot >= MAX_VERTEX_BINDINGS {
            return Err(RenderError::config(format!(
                "vertex buffer slot {slot} exceeds the limit of {MAX_VERTEX_BINDINGS}"
            )));
        }

        let binding = VertexBinding {
            buffer: buffer.id(),
            stride,
            layout: layout.id(),
        };
        if self.state.cache.set_vertex_buffer(slot, binding) {
            let attributes: Vec<(u32, VertexAttribute)> = layout
                .attributes()
                .iter()
                .enumerate()
                .filter(|(_, attribute)| attribute.buffer_slot == slot)
                .map(|(location, attribute)| (location as u32, *attribute))
                .collect();
            let rate = attributes
                .first()
                .map_or(VertexInputRate::Vertex, |(_, attribute)| attribute.rate);
            self.bindings.vertex_buffers.insert(
                slot,
                BoundVertexBuffer {
                    buffer: handle,
                    stride,
                    layout: layout.id(),
                    rate,
                    attributes,
                },
            );
            self.dirty.insert(Dirty::PIPELINE | Dirty::VERTEX_BUFFERS);
        }
        Ok(())
    }

    fn set_index_buffer(&mut self, buffer: &Buffer, format: IndexFormat) -> RenderResult<()> {
        self.frame.ensure_alive("vkCmdBindIndexBuffer")?;
        let native = alive(buffer.native(), "buffer", buffer.id())?;
        let handle = self.state.raw(native.buffer)?;
        if buffer.desc().kind != BufferKind::Index {
            return Err(RenderError::config(format!(
                "{:?} buffer bound as an index buffer",
                buffer.desc().kind
            )));
        }
        self.bindings.index_buffer = Some((handle, format));
        self.dirty.insert(Dirty::INDEX_BUFFER);
        Ok(())
    }

    fn set_uniform_buffer(&mut self, slot: u32, buffer: &Buffer) -> RenderResult<()> {
        self.frame.ensure_alive("vkCmdPushDescriptorSetKHR")?;
        let native = alive(buffer.native(), "buffer", buffer.id())?;
        let handle = self.state.raw(native.buffer)?;
        let descriptor_type = match buffer.desc().kind {
            BufferKind::Uniform => vk::DESCRIPTOR_TYPE_UNIFORM_BUFFER,
            BufferKind::Storage => vk::DESCRIPTOR_TYPE_STORAGE_BUFFER,
            kind => {
                return Err(RenderError::config(format!(
                    "{kind:?} buffer bound as a uniform buffer"
                )))
            }
        };
        if slot >= TEXTURE_BINDING_OFFSET {
            return Err(RenderError::config(format!(
                "uniform buffer slot {slot} exceeds the limit of {TEXTURE_BINDING_OFFSET}"
            )));
        }
        self.bindings.descriptors.insert(
            slot,
            DescriptorWrite::Buffer {
                binding: slot,
                descriptor_type,
                buffer: handle,
                offset: 0,
                range: buffer.desc().size,
            },
        );
        self.dirty.insert(Dirty::DESCRIPTORS);
        Ok(())
    }

    fn set_texture(
        &mut self,
        slot: u32,
        texture: &Texture,
        sampler: &SamplerState,
    ) -> RenderResult<()> {
        self.frame.ensure_alive("vkCmdPushDescriptorSetKHR")?;
        let native = alive(texture.native(), "texture", texture.id())?;
        let view = native.shader_view.ok_or_else(|| {
            RenderError::config(format!(
                "texture {:?} was not created with SAMPLED usage",
                texture.id()
            ))
        })?;
        let image_view = self.state.raw(view)?;
        let sampler_handle = alive(sampler.native(), "sampler", sampler.id())?;
        let sampler_object = self.state.raw(sampler_handle)?;
        if slot >= TEXTURE_BINDING_OFFSET {
            return Err(RenderError::config(format!(
                "texture slot {slot} exceeds the limit of {TEXTURE_BINDING_OFFSET}"
            )));
        }
        let binding = slot + TEXTURE_BINDING_OFFSET;
        self.bindings.descriptors.insert(
            binding,
            DescriptorWrite::CombinedImageSampler {
                binding,
                image_view,
                sampler: sampler_object,
                image_layout: conversions::resting_layout(texture.desc()),
            },
        );
        self.dirty.insert(Dirty::DESCRIPTORS);
        Ok(())
    }

    fn set_rasterizer_state(&mut self, state: &RasterizerState) -> RenderResult<()> {
        self.frame.ensure_alive("vkCmdBindPipeline")?;
        let handle = alive(state.native(), "rasterizer state", state.id())?;
        self.state.raw(handle)?;
        if self.state.cache.set_rasterizer(state.desc()) {
            self.bindings.rasterizer = *state.desc();
            self.dirty.insert(Dirty::PIPELINE);
        }
        Ok(())
    }

    fn set_blend_state(&mut self, state: &BlendState) -> RenderResult<()> {
        self.frame.ensure_alive("vkCmdBindPipeline")?;
        let handle = alive(state.native(), "blend state", state.id())?;
        self.state.raw(handle)?;
        if self.state.cache.set_blend(state.desc()) {
            self.bindings.blend = *state.desc();
            self.dirty.insert(Dirty::PIPELINE | Dirty::DYNAMIC);
        }
        Ok(())
    }

    fn set_depth_stencil_state(
        &mut self,
        state: &DepthStencilState,
        stencil_ref: Option<u32>,
    ) -> RenderResult<()> {
        self.frame.ensure_alive("vkCmdBindPipeline")?;
        let handle = alive(state.native(), "depth/stencil state", state.id())?;
        self.state.raw(handle)?;
        let reference = stencil_ref.unwrap_or(0);
        if self.state.cache.set_depth_stencil(state.desc(), reference) {
            self.bindings.depth_stencil = *state.desc();
            self.bindings.stencil_reference = reference;
            self.dirty.insert(Dirty::PIPELINE | Dirty::DYNAMIC);
        }
        Ok(())
    }

    fn set_primitive_topology(&mut self, topology: PrimitiveTopology) -> RenderResult<()> {
        self.frame.ensure_alive("vkCmdBindPipeline")?;
        if self.state.cache.set_topology(topology) {
            self.dirty.insert(Dirty::PIPELINE);
        }
        self.state.topology = topology;
        Ok(())
    }

    fn set_framebuffer(&mut self, framebuffer: Option<&Framebuffer>) -> RenderResult<()> {
        self.frame.ensure_alive("vkCmdBeginRenderPass")?;
        let target = match framebuffer {
            Some(framebuffer) => {
                let native = alive(framebuffer.native(), "framebuffer", framebuffer.id())?;
                let missing = || {
                    RenderError::config(format!(
                        "framebuffer {:?} has no native framebuffer",
                        framebuffer.id()
                    ))
                };
                let handle = self.state.raw(native.framebuffer.ok_or_else(missing)?)?;
                let render_pass = self.state.raw(native.render_pass.ok_or_else(missing)?)?;
                let layout = framebuffer.layout();
                RenderTarget {
                    framebuffer: Some((framebuffer.id(), handle)),
                    render_pass,
                    extent: framebuffer.extent(),
                    color_count: layout.colors.len() as u32,
                    depth_format: layout.depth_stencil.as_ref().map(|depth| depth.format),
                }
            }
            None => self.back_buffer_target(),
        };
        self.end_render_pass();
        self.target = target;
        self.state.cache.invalidate_all();
        self.dirty = Dirty::ALL;
        Ok(())
    }

    fn set_uniform_value(&mut self, _name: &str, _value: UniformValue) -> RenderResult<()> {
        Err(RenderError::unsupported(BackendType::Vulkan, "set_uniform_value"))
    }

    fn draw(&mut self, vertex_count: u32, start_vertex: u32) -> RenderResult<()> {
        let command_buffer = self.prepare_draw("vkCmdDraw", false)?;
        self.api
            .cmd_draw(command_buffer, vertex_count, 1, start_vertex, 0);
        self.state.record_draw(vertex_count, 1);
        Ok(())
    }

    fn draw_indexed(
        &mut self,
        index_count: u32,
        start_index: u32,
        base_vertex: i32,
    ) -> RenderResult<()> {
        let command_buffer = self.prepare_draw("vkCmdDrawIndexed", true)?;
        self.api
            .cmd_draw_indexed(command_buffer, index_count, 1, start_index, base_vertex, 0);
        self.state.record_draw(index_count, 1);
        Ok(())
    }

    fn draw_indexed_instanced(
        &mut self,
        index_count: u32,
        instance_count: u32,
    ) -> RenderResult<()> {
        let command_buffer = self.prepare_draw("vkCmdDrawIndexed", true)?;
        self.api
            .cmd_draw_indexed(command_buffer, index_count, instance_count, 0, 0, 0);
        self.state.record_draw(index_count, instance_count);
        Ok(())
    }

    fn dispatch(&mut self, x: u32, y: u32, z: u32) -> RenderResult<()> {
        self.frame.ensure_alive("vkCmdDispatch")?;
        if !self.bindings.shader.as_ref().is_some_and(|shader| shader.compute) {
            return Err(RenderError::config("dispatch needs a bound compute shader"));
        }
        let command_buffer = self.ensure_recording()?;
        // Dispatches are not allowed inside a render pass.
        self.end_render_pass();
        if self.dirty.contains(Dirty::PIPELINE) {
            let pipeline = self.compute_pipeline()?;
            self.api
                .cmd_bind_pipeline(command_buffer, vk::PIPELINE_BIND_POINT_COMPUTE, pipeline);
            self.dirty.remove(Dirty::PIPELINE);
        }
        if self.dirty.contains(Dirty::DESCRIPTORS) {
            self.push_descriptors(command_buffer, vk::PIPELINE_BIND_POINT_COMPUTE);
            self.dirty.remove(Dirty::DESCRIPTORS);
        }
        self.api.cmd_dispatch(command_buffer, x, y, z);
        self.state.record_dispatch();
        Ok(())
    }

    fn clear(&mut self, values: ClearValues) -> RenderResult<()> {
        self.frame.ensure_alive("vkCmdClearAttachments")?;
        let mut attachments = Vec::new();
        if let Some(color) = values.color {
            attachments.extend((0..self.target.color_count).map(|index| ClearAttachment {
                aspect_mask: vk::IMAGE_ASPECT_COLOR,
                color_attachment: index,
                value: ClearValue::Color(color),
            }));
        }
        if let Some(format) = self.target.depth_format {
            let mut aspect_mask = 0;
            if values.depth.is_some() {
                aspect_mask |= vk::IMAGE_ASPECT_DEPTH;
            }
            if values.stencil.is_some() && format.has_stencil() {
                aspect_mask |= vk::IMAGE_ASPECT_STENCIL;
            }
            if aspect_mask != 0 {
                attachments.push(ClearAttachment {
                    aspect_mask,
                    color_attachment: 0,
                    value: ClearValue::DepthStencil {
                        depth: values.depth.unwrap_or(1.0),
                        stencil: u32::from(values.stencil.unwrap_or(0)),
                    },
                });
            }
        }
        if attachments.is_empty() {
            return Ok(());
        }
        let command_buffer = self.ensure_render_pass()?;
        self.api
            .cmd_clear_attachments(command_buffer, &attachments, self.target.extent);
        Ok(())
    }

    fn present(&mut self, swap_interval: u32) -> RenderResult<()> {
        self.frame.ensure_alive("vkQueuePresentKHR")?;
        self.state.cache.invalidate_all();
        self.dirty = Dirty::ALL;
        if swap_interval != 1 {
            log::trace!("VulkanDevice: Swap interval {swap_interval} ignored, presenting with FIFO");
        }

        // An empty frame still runs its render pass so the image is
        // submitted through the same protocol.
        if self.frame.phase() == FramePhase::ImageAcquired {
            self.ensure_render_pass()?;
        }
        self.end_render_pass();
        let command_buffer = self.current_command_buffer()?;
        let result = self.api.end_command_buffer(command_buffer);
        self.fatal(result, "vkEndCommandBuffer")?;

        let submit = SubmitInfo {
            command_buffer,
            wait_semaphore: Some((
                self.image_available,
                vk::PIPELINE_STAGE_COLOR_ATTACHMENT_OUTPUT,
            )),
            signal_semaphore: Some(self.render_finished),
        };
        let result = self.api.queue_submit(&submit, self.in_flight);
        self.fatal(result, "vkQueueSubmit")?;
        self.advance(FrameSync::submitted)?;

        let result = self.api.queue_present(
            self.swapchain.handle,
            self.frame.image_index(),
            self.render_finished,
        );
        self.fatal(result, "vkQueuePresentKHR")?;
        self.advance(FrameSync::presented)?;

        let result = self.api.wait_for_fence(self.in_flight, u64::MAX);
        self.fatal(result, "vkWaitForFences")?;
        let result = self.api.reset_fence(self.in_flight);
        self.fatal(result, "vkResetFences")?;
        self.collect_retired();

        self.acquire_next_image()?;
        self.state.record_frame();
        Ok(())
    }

    fn resize_swapchain(&mut self, size: Extent2D) -> RenderResult<()> {
        self.frame.ensure_alive("vkCreateSwapchainKHR")?;
        if size.is_empty() {
            log::warn!(
                "VulkanDevice: Ignored resize to {}x{}",
                size.width,
                size.height
            );
            return Ok(());
        }

        if self.frame.phase() == FramePhase::Recording && self.frame_uploads {
            self.submit_abandoned_frame()?;
        }
        let result = self.api.device_wait_idle();
        self.fatal(result, "vkDeviceWaitIdle")?;
        // The partially recorded frame is abandoned.
        self.pass_open = false;
        self.collect_retired();

        let old = std::mem::take(&mut self.swapchain);
        destroy_swapchain_images(self.api.as_mut(), &old);
        let mut swapchain_state = self.state.swapchain;
        swapchain_state.extent = size;
        let created = create_swapchain_images(
            self.api.as_mut(),
            &self.memory_types,
            self.upload_command_buffer,
            self.surface,
            &swapchain_state,
            self.back_buffer_pass,
            old.handle,
        );
        self.api.destroy_swapchain(old.handle);
        match created {
            Ok(swapchain) => self.swapchain = swapchain,
            Err(err) => return Err(self.lose(err)),
        }
        swapchain_state.image_count = self.swapchain.images.len() as u32;
        self.state.swapchain = swapchain_state;
        self.ensure_command_buffers()?;

        // The abandoned acquire may have left the semaphore signaled.
        Retired::Semaphore(self.image_available).destroy(self.api.as_mut());
        self.image_available = NULL_HANDLE;
        match self.create_semaphore() {
            Ok(semaphore) => self.image_available = semaphore,
            Err(err) => return Err(self.lose(err)),
        }
        self.advance(FrameSync::restart)?;

        if self.target.framebuffer.is_none() {
            self.target = self.back_buffer_target();
        }
        self.acquire_next_image()?;
        self.state.cache.invalidate_all();
        self.dirty = Dirty::ALL;
        log::info!("VulkanDevice: Resized swapchain to {}x{}", size.width, size.height);
        Ok(())
    }

    fn flush(&mut self) -> RenderResult<()> {
        self.frame.ensure_alive("vkDeviceWaitIdle")?;
        let result = self.api.device_wait_idle();
        if result == VkResult::ERROR_DEVICE_LOST {
            return Err(self.lose(result.into_device_error("vkDeviceWaitIdle")));
        }
        result.check("vkDeviceWaitIdle")?;
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for VulkanDevice {
    fn drop(&mut self) {
        if self.device_created {
            let result = self.api.device_wait_idle();
            if !result.is_success() {
                log::warn!("VulkanDevice: vkDeviceWaitIdle returned {result:?} during teardown");
            }
            self.collect_retired();
            for pipeline in self.pipelines.drain() {
                self.api.destroy_pipeline(pipeline);
            }
            let swapchain = std::mem::take(&mut self.swapchain);
            destroy_swapchain_images(self.api.as_mut(), &swapchain);
            if swapchain.handle != NULL_HANDLE {
                self.api.destroy_swapchain(swapchain.handle);
            }
            for object in [
                Retired::RenderPass(self.back_buffer_pass),
                Retired::Semaphore(self.image_available),
                Retired::Semaphore(self.render_finished),
                Retired::Fence(self.in_flight),
            ] {
                object.destroy(self.api.as_mut());
            }
            if self.command_pool != NULL_HANDLE {
                self.api.destroy_command_pool(self.command_pool);
            }
        }
        self.api.destroy_device();
        log::debug!("VulkanDevice: Destroyed swapchain and device");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_core::renderer::shader::{ReflectedBlock, ReflectedTexture, ShaderReflection};

    #[test]
    fn memory_type_respects_type_bits_and_properties() {
        let types = [
            vk::MEMORY_PROPERTY_DEVICE_LOCAL,
            vk::MEMORY_PROPERTY_HOST_VISIBLE | vk::MEMORY_PROPERTY_HOST_COHERENT,
            vk::MEMORY_PROPERTY_DEVICE_LOCAL | vk::MEMORY_PROPERTY_HOST_VISIBLE,
        ];
        assert_eq!(find_memory_type(&types, 0b111, vk::MEMORY_PROPERTY_DEVICE_LOCAL), Some(0));
        assert_eq!(find_memory_type(&types, 0b110, vk::MEMORY_PROPERTY_DEVICE_LOCAL), Some(2));
        assert_eq!(
            find_memory_type(
                &types,
                0b011,
                vk::MEMORY_PROPERTY_HOST_VISIBLE | vk::MEMORY_PROPERTY_HOST_COHERENT
            ),
            Some(1)
        );
        assert_eq!(find_memory_type(&types, 0b001, vk::MEMORY_PROPERTY_HOST_VISIBLE), None);
    }

    #[test]
    fn spirv_bytes_become_little_endian_words() {
        let words = spirv_words(&[0x03, 0x02, 0x23, 0x07, 0x00, 0x00, 0x01, 0x00, 0xff]);
        assert_eq!(words, vec![0x0723_0203, 0x0001_0000]);
    }

    fn stage_info(stage: ShaderStage, reflection: ShaderReflection) -> ShaderStageInfo {
        ShaderStageInfo {
            stage,
            entry_point: "main".to_owned(),
            reflection,
        }
    }

    fn block(binding: u32) -> ReflectedBlock {
        ReflectedBlock {
            name: format!("block{binding}"),
            type_id: "_1".to_owned(),
            block_size: 64,
            set: 0,
            binding,
        }
    }

    #[test]
    fn descriptor_bindings_merge_stage_flags() {
        let vertex = stage_info(
            ShaderStage::Vertex,
            ShaderReflection {
                ubos: vec![block(0)],
                ..ShaderReflection::default()
            },
        );
        let fragment = stage_info(
            ShaderStage::Fragment,
            ShaderReflection {
                ubos: vec![block(0)],
                textures: vec![ReflectedTexture {
                    name: "albedo".to_owned(),
                    ty: "_5".to_owned(),
                    set: 0,
                    binding: TEXTURE_BINDING_OFFSET,
                }],
                ..ShaderReflection::default()
            },
        );
        let bindings = descriptor_bindings(&[vertex, fragment]).unwrap();
        assert_eq!(bindings.len(), 2);
        assert_eq!(bindings[0].binding, 0);
        assert_eq!(
            bindings[0].stage_flags,
            vk::SHADER_STAGE_VERTEX | vk::SHADER_STAGE_FRAGMENT
        );
        assert_eq!(bindings[1].descriptor_type, vk::DESCRIPTOR_TYPE_COMBINED_IMAGE_SAMPLER);
    }

    #[test]
    fn conflicting_binding_types_are_rejected() {
        let stage = stage_info(
            ShaderStage::Compute,
            ShaderReflection {
                ubos: vec![block(2)],
                ssbos: vec![block(2)],
                ..ShaderReflection::default()
            },
        );
        assert!(descriptor_bindings(&[stage]).unwrap_err().is_configuration());
    }

    #[test]
    fn transitions_carry_matching_access_masks() {
        let barrier = layout_transition(
            7,
            single_subresource(vk::IMAGE_ASPECT_COLOR),
            vk::IMAGE_LAYOUT_TRANSFER_DST_OPTIMAL,
            vk::IMAGE_LAYOUT_SHADER_READ_ONLY_OPTIMAL,
        );
        assert_eq!(barrier.src_access_mask, vk::ACCESS_TRANSFER_WRITE);
        assert_eq!(barrier.dst_access_mask, vk::ACCESS_SHADER_READ);
    }
}
