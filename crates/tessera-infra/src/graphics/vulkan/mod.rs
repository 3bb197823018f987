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

//! The explicit backend, built on Vulkan 1.1 with `VK_KHR_push_descriptor`.
//!
//! Fixed-function state is collected by the device and baked into pipelines
//! on demand. Every frame follows the acquire, record, submit and present
//! protocol tracked by [`frame::FrameSync`]; a failure anywhere in it loses
//! the device for good.

mod api;
pub mod conversions;
mod device;
pub mod frame;
mod pipeline;

pub use self::api::{
    consts, AttachmentDescription, BufferCopy, BufferCreateInfo, BufferImageCopy,
    ClearAttachment, ClearValue, ColorBlendAttachmentState, ComputePipelineCreateInfo,
    DepthStencilStateCreateInfo, DescriptorSetLayoutBinding, DescriptorWrite,
    GraphicsPipelineCreateInfo, ImageCreateInfo, ImageMemoryBarrier, ImageSubresourceRange,
    ImageViewCreateInfo, MemoryRequirements, PipelineShaderStageCreateInfo,
    RasterizationStateCreateInfo, RenderPassCreateInfo, SamplerCreateInfo, SpecializationInfo,
    SpecializationMapEntry, StencilOpState, SubmitInfo, SwapchainCreateInfo,
    VertexInputAttributeDescription, VertexInputBindingDescription, VkFormat, VkHandle,
    VkResult, VulkanApi, NULL_HANDLE,
};
pub use self::device::VulkanDevice;
pub use self::frame::FramePhase;
