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

//! The Vulkan driver seam.
//!
//! [`VulkanApi`] covers the instance, device, queue and command-buffer entry
//! points the device uses, with `VK_KHR_swapchain` and
//! `VK_KHR_push_descriptor`. Dispatchable and non-dispatchable handles cross
//! the seam as opaque [`VkHandle`] values; `0` is `VK_NULL_HANDLE`. Create
//! info structs keep only the fields the device sets and follow the field
//! names of the Vulkan headers.

#![allow(missing_docs)]

use std::any::Any;
use std::fmt::{self, Debug};
use std::ptr::NonNull;
use tessera_core::math::{Extent2D, Extent3D, Origin3D};
use tessera_core::renderer::api::SurfaceHandle;
use tessera_core::renderer::DeviceError;

/// An opaque Vulkan handle.
pub type VkHandle = u64;

/// `VK_NULL_HANDLE`.
pub const NULL_HANDLE: VkHandle = 0;

/// A `VkResult` status code.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct VkResult(pub i32);

impl VkResult {
    pub const SUCCESS: Self = Self(0);
    pub const NOT_READY: Self = Self(1);
    pub const TIMEOUT: Self = Self(2);
    pub const SUBOPTIMAL_KHR: Self = Self(1_000_001_003);
    pub const ERROR_OUT_OF_HOST_MEMORY: Self = Self(-1);
    pub const ERROR_OUT_OF_DEVICE_MEMORY: Self = Self(-2);
    pub const ERROR_INITIALIZATION_FAILED: Self = Self(-3);
    pub const ERROR_DEVICE_LOST: Self = Self(-4);
    pub const ERROR_MEMORY_MAP_FAILED: Self = Self(-5);
    pub const ERROR_LAYER_NOT_PRESENT: Self = Self(-6);
    pub const ERROR_FORMAT_NOT_SUPPORTED: Self = Self(-11);
    pub const ERROR_SURFACE_LOST_KHR: Self = Self(-1_000_000_000);
    pub const ERROR_OUT_OF_DATE_KHR: Self = Self(-1_000_001_004);

    /// `VK_SUCCESS` and `VK_SUBOPTIMAL_KHR`. A suboptimal swapchain still
    /// presents correctly and is recreated on the next resize.
    pub fn is_success(self) -> bool {
        self == Self::SUCCESS || self == Self::SUBOPTIMAL_KHR
    }

    /// The symbolic name of the code.
    pub fn name(self) -> &'static str {
        match self {
            Self::SUCCESS => "VK_SUCCESS",
            Self::NOT_READY => "VK_NOT_READY",
            Self::TIMEOUT => "VK_TIMEOUT",
            Self::SUBOPTIMAL_KHR => "VK_SUBOPTIMAL_KHR",
            Self::ERROR_OUT_OF_HOST_MEMORY => "VK_ERROR_OUT_OF_HOST_MEMORY",
            Self::ERROR_OUT_OF_DEVICE_MEMORY => "VK_ERROR_OUT_OF_DEVICE_MEMORY",
            Self::ERROR_INITIALIZATION_FAILED => "VK_ERROR_INITIALIZATION_FAILED",
            Self::ERROR_DEVICE_LOST => "VK_ERROR_DEVICE_LOST",
            Self::ERROR_MEMORY_MAP_FAILED => "VK_ERROR_MEMORY_MAP_FAILED",
            Self::ERROR_LAYER_NOT_PRESENT => "VK_ERROR_LAYER_NOT_PRESENT",
            Self::ERROR_FORMAT_NOT_SUPPORTED => "VK_ERROR_FORMAT_NOT_SUPPORTED",
            Self::ERROR_SURFACE_LOST_KHR => "VK_ERROR_SURFACE_LOST_KHR",
            Self::ERROR_OUT_OF_DATE_KHR => "VK_ERROR_OUT_OF_DATE_KHR",
            _ => "unknown VkResult",
        }
    }

    /// Turns a status into `Ok(())` or the device error for `operation`.
    pub fn check(self, operation: &'static str) -> Result<(), DeviceError> {
        if self.is_success() {
            Ok(())
        } else {
            Err(self.into_device_error(operation))
        }
    }

    /// Wraps the code into a device error for `operation`.
    pub fn into_device_error(self, operation: &'static str) -> DeviceError {
        DeviceError::new(operation, self.0 as i64, self.name())
    }
}

impl Debug for VkResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name(), self.0)
    }
}

/// A `VkFormat` value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VkFormat(pub u32);

impl VkFormat {
    pub const UNDEFINED: Self = Self(0);
    pub const R8_UNORM: Self = Self(9);
    pub const R8G8_UNORM: Self = Self(16);
    pub const R8G8B8A8_UNORM: Self = Self(37);
    pub const R8G8B8A8_UINT: Self = Self(41);
    pub const R8G8B8A8_SRGB: Self = Self(43);
    pub const B8G8R8A8_UNORM: Self = Self(44);
    pub const B8G8R8A8_SRGB: Self = Self(50);
    pub const A2B10G10R10_UNORM_PACK32: Self = Self(64);
    pub const R16_SFLOAT: Self = Self(76);
    pub const R16G16_SNORM: Self = Self(78);
    pub const R16G16_SFLOAT: Self = Self(83);
    pub const R16G16B16A16_SFLOAT: Self = Self(97);
    pub const R32_UINT: Self = Self(98);
    pub const R32_SINT: Self = Self(99);
    pub const R32_SFLOAT: Self = Self(100);
    pub const R32G32_UINT: Self = Self(101);
    pub const R32G32_SINT: Self = Self(102);
    pub const R32G32_SFLOAT: Self = Self(103);
    pub const R32G32B32_UINT: Self = Self(104);
    pub const R32G32B32_SINT: Self = Self(105);
    pub const R32G32B32_SFLOAT: Self = Self(106);
    pub const R32G32B32A32_UINT: Self = Self(107);
    pub const R32G32B32A32_SINT: Self = Self(108);
    pub const R32G32B32A32_SFLOAT: Self = Self(109);
    pub const B10G11R11_UFLOAT_PACK32: Self = Self(122);
    pub const D16_UNORM: Self = Self(124);
    pub const D32_SFLOAT: Self = Self(126);
    pub const D24_UNORM_S8_UINT: Self = Self(129);
    pub const D32_SFLOAT_S8_UINT: Self = Self(130);
    pub const BC1_RGBA_UNORM_BLOCK: Self = Self(133);
    pub const BC1_RGBA_SRGB_BLOCK: Self = Self(134);
    pub const BC2_UNORM_BLOCK: Self = Self(135);
    pub const BC3_UNORM_BLOCK: Self = Self(137);
    pub const BC3_SRGB_BLOCK: Self = Self(138);
    pub const BC4_UNORM_BLOCK: Self = Self(139);
    pub const BC5_UNORM_BLOCK: Self = Self(141);
    pub const BC7_UNORM_BLOCK: Self = Self(145);
    pub const BC7_SRGB_BLOCK: Self = Self(146);
}

/// Vulkan enumerants and flag bits, with the header's `VK_` prefix dropped.
pub mod consts {
    // VkBufferUsageFlagBits
    pub const BUFFER_USAGE_TRANSFER_SRC: u32 = 0x1;
    pub const BUFFER_USAGE_TRANSFER_DST: u32 = 0x2;
    pub const BUFFER_USAGE_UNIFORM_BUFFER: u32 = 0x10;
    pub const BUFFER_USAGE_STORAGE_BUFFER: u32 = 0x20;
    pub const BUFFER_USAGE_INDEX_BUFFER: u32 = 0x40;
    pub const BUFFER_USAGE_VERTEX_BUFFER: u32 = 0x80;

    // VkImageUsageFlagBits
    pub const IMAGE_USAGE_TRANSFER_SRC: u32 = 0x1;
    pub const IMAGE_USAGE_TRANSFER_DST: u32 = 0x2;
    pub const IMAGE_USAGE_SAMPLED: u32 = 0x4;
    pub const IMAGE_USAGE_STORAGE: u32 = 0x8;
    pub const IMAGE_USAGE_COLOR_ATTACHMENT: u32 = 0x10;
    pub const IMAGE_USAGE_DEPTH_STENCIL_ATTACHMENT: u32 = 0x20;

    pub const IMAGE_CREATE_CUBE_COMPATIBLE: u32 = 0x10;

    // VkMemoryPropertyFlagBits
    pub const MEMORY_PROPERTY_DEVICE_LOCAL: u32 = 0x1;
    pub const MEMORY_PROPERTY_HOST_VISIBLE: u32 = 0x2;
    pub const MEMORY_PROPERTY_HOST_COHERENT: u32 = 0x4;

    // VkImageLayout
    pub const IMAGE_LAYOUT_UNDEFINED: u32 = 0;
    pub const IMAGE_LAYOUT_GENERAL: u32 = 1;
    pub const IMAGE_LAYOUT_COLOR_ATTACHMENT_OPTIMAL: u32 = 2;
    pub const IMAGE_LAYOUT_DEPTH_STENCIL_ATTACHMENT_OPTIMAL: u32 = 3;
    pub const IMAGE_LAYOUT_SHADER_READ_ONLY_OPTIMAL: u32 = 5;
    pub const IMAGE_LAYOUT_TRANSFER_DST_OPTIMAL: u32 = 7;
    pub const IMAGE_LAYOUT_PRESENT_SRC_KHR: u32 = 1_000_001_002;

    // VkImageAspectFlagBits
    pub const IMAGE_ASPECT_COLOR: u32 = 0x1;
    pub const IMAGE_ASPECT_DEPTH: u32 = 0x2;
    pub const IMAGE_ASPECT_STENCIL: u32 = 0x4;

    // VkImageType / VkImageViewType
    pub const IMAGE_TYPE_1D: u32 = 0;
    pub const IMAGE_TYPE_2D: u32 = 1;
    pub const IMAGE_TYPE_3D: u32 = 2;
    pub const IMAGE_VIEW_TYPE_1D: u32 = 0;
    pub const IMAGE_VIEW_TYPE_2D: u32 = 1;
    pub const IMAGE_VIEW_TYPE_3D: u32 = 2;
    pub const IMAGE_VIEW_TYPE_CUBE: u32 = 3;
    pub const IMAGE_VIEW_TYPE_1D_ARRAY: u32 = 4;
    pub const IMAGE_VIEW_TYPE_2D_ARRAY: u32 = 5;
    pub const IMAGE_VIEW_TYPE_CUBE_ARRAY: u32 = 6;

    // VkPipelineStageFlagBits
    pub const PIPELINE_STAGE_TOP_OF_PIPE: u32 = 0x1;
    pub const PIPELINE_STAGE_FRAGMENT_SHADER: u32 = 0x80;
    pub const PIPELINE_STAGE_EARLY_FRAGMENT_TESTS: u32 = 0x100;
    pub const PIPELINE_STAGE_COLOR_ATTACHMENT_OUTPUT: u32 = 0x400;
    pub const PIPELINE_STAGE_TRANSFER: u32 = 0x1000;
    pub const PIPELINE_STAGE_ALL_COMMANDS: u32 = 0x10000;

    // VkAccessFlagBits
    pub const ACCESS_SHADER_READ: u32 = 0x20;
    pub const ACCESS_COLOR_ATTACHMENT_WRITE: u32 = 0x100;
    pub const ACCESS_DEPTH_STENCIL_ATTACHMENT_WRITE: u32 = 0x400;
    pub const ACCESS_TRANSFER_WRITE: u32 = 0x1000;

    // VkShaderStageFlagBits
    pub const SHADER_STAGE_VERTEX: u32 = 0x1;
    pub const SHADER_STAGE_GEOMETRY: u32 = 0x8;
    pub const SHADER_STAGE_FRAGMENT: u32 = 0x10;
    pub const SHADER_STAGE_COMPUTE: u32 = 0x20;

    // VkDescriptorType
    pub const DESCRIPTOR_TYPE_COMBINED_IMAGE_SAMPLER: u32 = 1;
    pub const DESCRIPTOR_TYPE_UNIFORM_BUFFER: u32 = 6;
    pub const DESCRIPTOR_TYPE_STORAGE_BUFFER: u32 = 7;

    // VkPipelineBindPoint
    pub const PIPELINE_BIND_POINT_GRAPHICS: u32 = 0;
    pub const PIPELINE_BIND_POINT_COMPUTE: u32 = 1;

    // VkPrimitiveTopology
    pub const PRIMITIVE_TOPOLOGY_POINT_LIST: u32 = 0;
    pub const PRIMITIVE_TOPOLOGY_LINE_LIST: u32 = 1;
    pub const PRIMITIVE_TOPOLOGY_LINE_STRIP: u32 = 2;
    pub const PRIMITIVE_TOPOLOGY_TRIANGLE_LIST: u32 = 3;
    pub const PRIMITIVE_TOPOLOGY_TRIANGLE_STRIP: u32 = 4;

    // VkPolygonMode / VkCullModeFlagBits / VkFrontFace
    pub const POLYGON_MODE_FILL: u32 = 0;
    pub const POLYGON_MODE_LINE: u32 = 1;
    pub const CULL_MODE_NONE: u32 = 0;
    pub const CULL_MODE_FRONT: u32 = 0x1;
    pub const CULL_MODE_BACK: u32 = 0x2;
    pub const FRONT_FACE_COUNTER_CLOCKWISE: u32 = 0;
    pub const FRONT_FACE_CLOCKWISE: u32 = 1;

    // VkCompareOp
    pub const COMPARE_OP_NEVER: u32 = 0;
    pub const COMPARE_OP_LESS: u32 = 1;
    pub const COMPARE_OP_EQUAL: u32 = 2;
    pub const COMPARE_OP_LESS_OR_EQUAL: u32 = 3;
    pub const COMPARE_OP_GREATER: u32 = 4;
    pub const COMPARE_OP_NOT_EQUAL: u32 = 5;
    pub const COMPARE_OP_GREATER_OR_EQUAL: u32 = 6;
    pub const COMPARE_OP_ALWAYS: u32 = 7;

    // VkStencilOp
    pub const STENCIL_OP_KEEP: u32 = 0;
    pub const STENCIL_OP_ZERO: u32 = 1;
    pub const STENCIL_OP_REPLACE: u32 = 2;
    pub const STENCIL_OP_INCREMENT_AND_CLAMP: u32 = 3;
    pub const STENCIL_OP_DECREMENT_AND_CLAMP: u32 = 4;
    pub const STENCIL_OP_INVERT: u32 = 5;
    pub const STENCIL_OP_INCREMENT_AND_WRAP: u32 = 6;
    pub const STENCIL_OP_DECREMENT_AND_WRAP: u32 = 7;

    // VkBlendFactor
    pub const BLEND_FACTOR_ZERO: u32 = 0;
    pub const BLEND_FACTOR_ONE: u32 = 1;
    pub const BLEND_FACTOR_SRC_COLOR: u32 = 2;
    pub const BLEND_FACTOR_ONE_MINUS_SRC_COLOR: u32 = 3;
    pub const BLEND_FACTOR_DST_COLOR: u32 = 4;
    pub const BLEND_FACTOR_ONE_MINUS_DST_COLOR: u32 = 5;
    pub const BLEND_FACTOR_SRC_ALPHA: u32 = 6;
    pub const BLEND_FACTOR_ONE_MINUS_SRC_ALPHA: u32 = 7;
    pub const BLEND_FACTOR_DST_ALPHA: u32 = 8;
    pub const BLEND_FACTOR_ONE_MINUS_DST_ALPHA: u32 = 9;
    pub const BLEND_FACTOR_CONSTANT_COLOR: u32 = 10;
    pub const BLEND_FACTOR_ONE_MINUS_CONSTANT_COLOR: u32 = 11;
    pub const BLEND_FACTOR_SRC_ALPHA_SATURATE: u32 = 14;

    // VkBlendOp
    pub const BLEND_OP_ADD: u32 = 0;
    pub const BLEND_OP_SUBTRACT: u32 = 1;
    pub const BLEND_OP_REVERSE_SUBTRACT: u32 = 2;
    pub const BLEND_OP_MIN: u32 = 3;
    pub const BLEND_OP_MAX: u32 = 4;

    // VkColorComponentFlagBits
    pub const COLOR_COMPONENT_R: u32 = 0x1;
    pub const COLOR_COMPONENT_G: u32 = 0x2;
    pub const COLOR_COMPONENT_B: u32 = 0x4;
    pub const COLOR_COMPONENT_A: u32 = 0x8;

    // VkFilter / VkSamplerMipmapMode / VkSamplerAddressMode / VkBorderColor
    pub const FILTER_NEAREST: u32 = 0;
    pub const FILTER_LINEAR: u32 = 1;
    pub const SAMPLER_MIPMAP_MODE_NEAREST: u32 = 0;
    pub const SAMPLER_MIPMAP_MODE_LINEAR: u32 = 1;
    pub const SAMPLER_ADDRESS_MODE_REPEAT: u32 = 0;
    pub const SAMPLER_ADDRESS_MODE_MIRRORED_REPEAT: u32 = 1;
    pub const SAMPLER_ADDRESS_MODE_CLAMP_TO_EDGE: u32 = 2;
    pub const SAMPLER_ADDRESS_MODE_CLAMP_TO_BORDER: u32 = 3;
    pub const BORDER_COLOR_FLOAT_TRANSPARENT_BLACK: u32 = 0;
    pub const BORDER_COLOR_FLOAT_OPAQUE_BLACK: u32 = 2;
    pub const BORDER_COLOR_FLOAT_OPAQUE_WHITE: u32 = 4;

    // VkIndexType / VkVertexInputRate
    pub const INDEX_TYPE_UINT16: u32 = 0;
    pub const INDEX_TYPE_UINT32: u32 = 1;
    pub const VERTEX_INPUT_RATE_VERTEX: u32 = 0;
    pub const VERTEX_INPUT_RATE_INSTANCE: u32 = 1;

    // VkDynamicState
    pub const DYNAMIC_STATE_VIEWPORT: u32 = 0;
    pub const DYNAMIC_STATE_SCISSOR: u32 = 1;
    pub const DYNAMIC_STATE_BLEND_CONSTANTS: u32 = 4;
    pub const DYNAMIC_STATE_STENCIL_REFERENCE: u32 = 8;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryRequirements {
    pub size: u64,
    pub alignment: u64,
    pub memory_type_bits: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapchainCreateInfo {
    pub surface: VkHandle,
    pub extent: Extent2D,
    pub format: VkFormat,
    pub min_image_count: u32,
    pub old_swapchain: VkHandle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferCreateInfo {
    pub size: u64,
    pub usage: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageCreateInfo {
    pub flags: u32,
    pub image_type: u32,
    pub format: VkFormat,
    pub extent: Extent3D,
    pub mip_levels: u32,
    pub array_layers: u32,
    pub usage: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageSubresourceRange {
    pub aspect_mask: u32,
    pub base_mip_level: u32,
    pub level_count: u32,
    pub base_array_layer: u32,
    pub layer_count: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageViewCreateInfo {
    pub image: VkHandle,
    pub view_type: u32,
    pub format: VkFormat,
    pub subresource_range: ImageSubresourceRange,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplerCreateInfo {
    pub mag_filter: u32,
    pub min_filter: u32,
    pub mipmap_mode: u32,
    pub address_mode_u: u32,
    pub address_mode_v: u32,
    pub address_mode_w: u32,
    pub mip_lod_bias: f32,
    pub anisotropy_enable: bool,
    pub max_anisotropy: f32,
    pub compare_enable: bool,
    pub compare_op: u32,
    pub min_lod: f32,
    pub max_lod: f32,
    pub border_color: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DescriptorSetLayoutBinding {
    pub binding: u32,
    pub descriptor_type: u32,
    pub stage_flags: u32,
}

/// One render-pass attachment. It is loaded and stored, and stays in
/// `layout` before and after the pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AttachmentDescription {
    pub format: VkFormat,
    pub layout: u32,
}

/// A single-subpass render pass.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RenderPassCreateInfo {
    pub color_attachments: Vec<AttachmentDescription>,
    pub depth_stencil_attachment: Option<AttachmentDescription>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpecializationMapEntry {
    pub constant_id: u32,
    pub offset: u32,
    pub size: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpecializationInfo {
    pub map_entries: Vec<SpecializationMapEntry>,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineShaderStageCreateInfo {
    pub stage: u32,
    pub module: VkHandle,
    pub name: String,
    pub specialization_info: SpecializationInfo,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexInputBindingDescription {
    pub binding: u32,
    pub stride: u32,
    pub input_rate: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexInputAttributeDescription {
    pub location: u32,
    pub binding: u32,
    pub format: VkFormat,
    pub offset: u32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RasterizationStateCreateInfo {
    pub depth_clamp_enable: bool,
    pub polygon_mode: u32,
    pub cull_mode: u32,
    pub front_face: u32,
    pub depth_bias_enable: bool,
    pub depth_bias_constant_factor: f32,
    pub depth_bias_clamp: f32,
    pub depth_bias_slope_factor: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StencilOpState {
    pub fail_op: u32,
    pub pass_op: u32,
    pub depth_fail_op: u32,
    pub compare_op: u32,
    pub compare_mask: u32,
    pub write_mask: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DepthStencilStateCreateInfo {
    pub depth_test_enable: bool,
    pub depth_write_enable: bool,
    pub depth_compare_op: u32,
    pub stencil_test_enable: bool,
    pub front: StencilOpState,
    pub back: StencilOpState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColorBlendAttachmentState {
    pub blend_enable: bool,
    pub src_color_blend_factor: u32,
    pub dst_color_blend_factor: u32,
    pub color_blend_op: u32,
    pub src_alpha_blend_factor: u32,
    pub dst_alpha_blend_factor: u32,
    pub alpha_blend_op: u32,
    pub color_write_mask: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GraphicsPipelineCreateInfo {
    pub stages: Vec<PipelineShaderStageCreateInfo>,
    pub vertex_bindings: Vec<VertexInputBindingDescription>,
    pub vertex_attributes: Vec<VertexInputAttributeDescription>,
    pub topology: u32,
    pub rasterization: RasterizationStateCreateInfo,
    pub depth_stencil: DepthStencilStateCreateInfo,
    /// One entry per color attachment of the render pass.
    pub color_blend_attachments: Vec<ColorBlendAttachmentState>,
    pub dynamic_states: Vec<u32>,
    pub layout: VkHandle,
    pub render_pass: VkHandle,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComputePipelineCreateInfo {
    pub stage: PipelineShaderStageCreateInfo,
    pub layout: VkHandle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferCopy {
    pub src_offset: u64,
    pub dst_offset: u64,
    pub size: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferImageCopy {
    pub buffer_offset: u64,
    pub aspect_mask: u32,
    pub mip_level: u32,
    pub base_array_layer: u32,
    pub image_offset: Origin3D,
    pub image_extent: Extent3D,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageMemoryBarrier {
    pub image: VkHandle,
    pub src_access_mask: u32,
    pub dst_access_mask: u32,
    pub old_layout: u32,
    pub new_layout: u32,
    pub subresource_range: ImageSubresourceRange,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ClearValue {
    Color([f32; 4]),
    DepthStencil { depth: f32, stencil: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClearAttachment {
    pub aspect_mask: u32,
    pub color_attachment: u32,
    pub value: ClearValue,
}

/// One `VkWriteDescriptorSet` of a push-descriptor update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DescriptorWrite {
    Buffer {
        binding: u32,
        descriptor_type: u32,
        buffer: VkHandle,
        offset: u64,
        range: u64,
    },
    CombinedImageSampler {
        binding: u32,
        image_view: VkHandle,
        sampler: VkHandle,
        image_layout: u32,
    },
}

impl DescriptorWrite {
    pub fn binding(&self) -> u32 {
        match *self {
            DescriptorWrite::Buffer { binding, .. }
            | DescriptorWrite::CombinedImageSampler { binding, .. } => binding,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubmitInfo {
    pub command_buffer: VkHandle,
    /// A semaphore to wait on and the stage mask the wait applies to.
    pub wait_semaphore: Option<(VkHandle, u32)>,
    pub signal_semaphore: Option<VkHandle>,
}

/// The Vulkan entry points used by [`VulkanDevice`](super::VulkanDevice).
///
/// Create functions return the new handle or the failing status. Functions
/// returning a bare [`VkResult`] mirror the native call; `vkCmd*` functions
/// record into a command buffer and cannot fail.
#[allow(missing_docs)]
pub trait VulkanApi: Debug {
    fn as_any(&self) -> &dyn Any;

    // Instance and device
    fn create_instance(&mut self, validation: bool) -> Result<(), VkResult>;
    fn create_surface(&mut self, surface: &SurfaceHandle) -> Result<VkHandle, VkResult>;
    /// Picks a physical device with a graphics queue that can present to
    /// `surface`, and creates the logical device.
    fn create_device(&mut self, surface: VkHandle) -> Result<(), VkResult>;
    /// `propertyFlags` of every memory type, indexed by memory type index.
    fn memory_types(&self) -> Vec<u32>;
    /// Destroys the device, the surface and the instance.
    fn destroy_device(&mut self);

    // Swapchain
    fn create_swapchain(&mut self, info: &SwapchainCreateInfo) -> Result<VkHandle, VkResult>;
    fn get_swapchain_images(&mut self, swapchain: VkHandle) -> Result<Vec<VkHandle>, VkResult>;
    fn destroy_swapchain(&mut self, swapchain: VkHandle);
    /// `vkAcquireNextImageKHR` with an unbounded timeout.
    fn acquire_next_image(&mut self, swapchain: VkHandle, semaphore: VkHandle) -> (VkResult, u32);
    fn queue_present(&mut self, swapchain: VkHandle, image_index: u32, wait_semaphore: VkHandle)
        -> VkResult;

    // Memory and resources
    fn create_buffer(&mut self, info: &BufferCreateInfo) -> Result<VkHandle, VkResult>;
    fn destroy_buffer(&mut self, buffer: VkHandle);
    fn buffer_memory_requirements(&self, buffer: VkHandle) -> MemoryRequirements;
    fn create_image(&mut self, info: &ImageCreateInfo) -> Result<VkHandle, VkResult>;
    fn destroy_image(&mut self, image: VkHandle);
    fn image_memory_requirements(&self, image: VkHandle) -> MemoryRequirements;
    fn allocate_memory(&mut self, size: u64, memory_type_index: u32) -> Result<VkHandle, VkResult>;
    fn free_memory(&mut self, memory: VkHandle);
    fn bind_buffer_memory(&mut self, buffer: VkHandle, memory: VkHandle) -> VkResult;
    fn bind_image_memory(&mut self, image: VkHandle, memory: VkHandle) -> VkResult;
    fn map_memory(&mut self, memory: VkHandle, offset: u64, size: u64) -> Result<NonNull<u8>, VkResult>;
    fn unmap_memory(&mut self, memory: VkHandle);
    fn create_image_view(&mut self, info: &ImageViewCreateInfo) -> Result<VkHandle, VkResult>;
    fn destroy_image_view(&mut self, view: VkHandle);
    fn create_sampler(&mut self, info: &SamplerCreateInfo) -> Result<VkHandle, VkResult>;
    fn destroy_sampler(&mut self, sampler: VkHandle);

    // Shaders and pipelines
    fn create_shader_module(&mut self, code: &[u32]) -> Result<VkHandle, VkResult>;
    fn destroy_shader_module(&mut self, module: VkHandle);
    /// Creates a layout with `VK_DESCRIPTOR_SET_LAYOUT_CREATE_PUSH_DESCRIPTOR_BIT_KHR`.
    fn create_push_descriptor_set_layout(
        &mut self,
        bindings: &[DescriptorSetLayoutBinding],
    ) -> Result<VkHandle, VkResult>;
    fn destroy_descriptor_set_layout(&mut self, layout: VkHandle);
    fn create_pipeline_layout(&mut self, set_layout: VkHandle) -> Result<VkHandle, VkResult>;
    fn destroy_pipeline_layout(&mut self, layout: VkHandle);
    fn create_render_pass(&mut self, info: &RenderPassCreateInfo) -> Result<VkHandle, VkResult>;
    fn destroy_render_pass(&mut self, render_pass: VkHandle);
    fn create_framebuffer(
        &mut self,
        render_pass: VkHandle,
        attachments: &[VkHandle],
        extent: Extent2D,
    ) -> Result<VkHandle, VkResult>;
    fn destroy_framebuffer(&mut self, framebuffer: VkHandle);
    fn create_graphics_pipeline(&mut self, info: &GraphicsPipelineCreateInfo) -> Result<VkHandle, VkResult>;
    fn create_compute_pipeline(&mut self, info: &ComputePipelineCreateInfo) -> Result<VkHandle, VkResult>;
    fn destroy_pipeline(&mut self, pipeline: VkHandle);

    // Commands
    fn create_command_pool(&mut self) -> Result<VkHandle, VkResult>;
    fn destroy_command_pool(&mut self, pool: VkHandle);
    fn allocate_command_buffers(&mut self, pool: VkHandle, count: u32) -> Result<Vec<VkHandle>, VkResult>;
    fn reset_command_buffer(&mut self, command_buffer: VkHandle) -> VkResult;
    fn begin_command_buffer(&mut self, command_buffer: VkHandle, one_time_submit: bool) -> VkResult;
    fn end_command_buffer(&mut self, command_buffer: VkHandle) -> VkResult;
    fn cmd_begin_render_pass(
        &mut self,
        command_buffer: VkHandle,
        render_pass: VkHandle,
        framebuffer: VkHandle,
        extent: Extent2D,
    );
    fn cmd_end_render_pass(&mut self, command_buffer: VkHandle);
    fn cmd_bind_pipeline(&mut self, command_buffer: VkHandle, bind_point: u32, pipeline: VkHandle);
    fn cmd_bind_vertex_buffer(&mut self, command_buffer: VkHandle, binding: u32, buffer: VkHandle, offset: u64);
    fn cmd_bind_index_buffer(&mut self, command_buffer: VkHandle, buffer: VkHandle, offset: u64, index_type: u32);
    fn cmd_push_descriptor_set(
        &mut self,
        command_buffer: VkHandle,
        bind_point: u32,
        layout: VkHandle,
        set: u32,
        writes: &[DescriptorWrite],
    );
    fn cmd_set_viewport(&mut self, command_buffer: VkHandle, extent: Extent2D);
    fn cmd_set_scissor(&mut self, command_buffer: VkHandle, extent: Extent2D);
    fn cmd_set_stencil_reference(&mut self, command_buffer: VkHandle, reference: u32);
    fn cmd_set_blend_constants(&mut self, command_buffer: VkHandle, constants: [f32; 4]);
    fn cmd_clear_attachments(&mut self, command_buffer: VkHandle, attachments: &[ClearAttachment], extent: Extent2D);
    fn cmd_draw(
        &mut self,
        command_buffer: VkHandle,
        vertex_count: u32,
        instance_count: u32,
        first_vertex: u32,
        first_instance: u32,
    );
    fn cmd_draw_indexed(
        &mut self,
        command_buffer: VkHandle,
        index_count: u32,
        instance_count: u32,
        first_index: u32,
        vertex_offset: i32,
        first_instance: u32,
    );
    fn cmd_dispatch(&mut self, command_buffer: VkHandle, x: u32, y: u32, z: u32);
    fn cmd_copy_buffer(&mut self, command_buffer: VkHandle, src: VkHandle, dst: VkHandle, regions: &[BufferCopy]);
    fn cmd_copy_buffer_to_image(
        &mut self,
        command_buffer: VkHandle,
        src: VkHandle,
        dst: VkHandle,
        dst_layout: u32,
        regions: &[BufferImageCopy],
    );
    fn cmd_pipeline_barrier(
        &mut self,
        command_buffer: VkHandle,
        src_stage_mask: u32,
        dst_stage_mask: u32,
        image_barriers: &[ImageMemoryBarrier],
    );

    // Synchronization and submission
    fn create_semaphore(&mut self) -> Result<VkHandle, VkResult>;
    fn destroy_semaphore(&mut self, semaphore: VkHandle);
    fn create_fence(&mut self, signaled: bool) -> Result<VkHandle, VkResult>;
    fn destroy_fence(&mut self, fence: VkHandle);
    fn wait_for_fence(&mut self, fence: VkHandle, timeout: u64) -> VkResult;
    fn reset_fence(&mut self, fence: VkHandle) -> VkResult;
    fn queue_submit(&mut self, submit: &SubmitInfo, fence: VkHandle) -> VkResult;
    fn queue_wait_idle(&mut self) -> VkResult;
    fn device_wait_idle(&mut self) -> VkResult;
}
