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

use super::{Failures, Ledger, StateSnapshot};
use crate::graphics::vulkan::{
    consts as vk, BufferCopy, BufferCreateInfo, BufferImageCopy, ClearAttachment,
    ComputePipelineCreateInfo, DescriptorSetLayoutBinding, DescriptorWrite,
    GraphicsPipelineCreateInfo, ImageCreateInfo, ImageMemoryBarrier, ImageViewCreateInfo,
    MemoryRequirements, RenderPassCreateInfo, SamplerCreateInfo, SubmitInfo, SwapchainCreateInfo,
    VkHandle, VkResult, VulkanApi, NULL_HANDLE,
};
use std::any::Any;
use std::collections::HashMap;
use std::fmt::{Debug, Display};
use std::ptr::NonNull;
use tessera_core::math::Extent2D;
use tessera_core::renderer::api::SurfaceHandle;
use tessera_core::renderer::shader::SPIRV_MAGIC;

const ALLOCATION_ALIGNMENT: u64 = 256;

/// Memory type 0 is device local, memory type 1 is host visible and coherent.
const MEMORY_TYPES: [u32; 2] = [
    vk::MEMORY_PROPERTY_DEVICE_LOCAL,
    vk::MEMORY_PROPERTY_HOST_VISIBLE | vk::MEMORY_PROPERTY_HOST_COHERENT,
];

fn align(size: u64) -> u64 {
    size.div_ceil(ALLOCATION_ALIGNMENT) * ALLOCATION_ALIGNMENT
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CommandBufferState {
    Initial,
    Recording,
    Executable,
    Pending,
    Invalid,
}

#[derive(Debug)]
enum Command {
    CopyBuffer {
        src: VkHandle,
        dst: VkHandle,
        regions: Vec<BufferCopy>,
    },
    CopyBufferToImage {
        src: VkHandle,
    },
    Draw {
        args: String,
    },
}

#[derive(Debug)]
struct CommandBuffer {
    state: CommandBufferState,
    one_time: bool,
    commands: Vec<Command>,
    /// Everything bound since recording began.
    bound: StateSnapshot,
    render_pass: Option<VkHandle>,
    pipelines: HashMap<u32, VkHandle>,
    vertex_buffers: Vec<u32>,
    index_buffer: bool,
}

impl CommandBuffer {
    fn new() -> Self {
        Self {
            state: CommandBufferState::Initial,
            one_time: false,
            commands: Vec::new(),
            bound: StateSnapshot::new(),
            render_pass: None,
            pipelines: HashMap::new(),
            vertex_buffers: Vec::new(),
            index_buffer: false,
        }
    }

    fn restart(&mut self, state: CommandBufferState) {
        self.state = state;
        self.commands.clear();
        self.bound.clear();
        self.render_pass = None;
        self.pipelines.clear();
        self.vertex_buffers.clear();
        self.index_buffer = false;
    }
}

#[derive(Debug)]
struct BufferObject {
    info: BufferCreateInfo,
    memory: Option<VkHandle>,
}

#[derive(Debug)]
struct ImageObject {
    /// `None` for swapchain images.
    info: Option<ImageCreateInfo>,
    memory: Option<VkHandle>,
}

#[derive(Debug)]
struct MemoryObject {
    bytes: Vec<u8>,
    properties: u32,
    mapped: bool,
}

#[derive(Debug)]
struct SwapchainObject {
    info: SwapchainCreateInfo,
    images: Vec<VkHandle>,
    next: u32,
    acquired: Vec<u32>,
}

#[derive(Debug)]
struct FramebufferObject {
    render_pass: VkHandle,
    extent: Extent2D,
}

#[derive(Debug)]
struct PipelineObject {
    bind_point: u32,
    /// The create info the pipeline was baked from.
    description: String,
    vertex_bindings: Vec<u32>,
}

/// Whether a command must be recorded inside a render pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scope {
    Inside,
    Outside,
    Any,
}

/// An in-memory Vulkan instance, device and graphics queue.
///
/// Submitted work completes immediately, but command buffers stay pending
/// until the host observes completion through a fence wait or an idle wait,
/// as the validation layers track it. Protocol violations are logged and
/// counted in [`validation_errors`](Self::validation_errors) instead of
/// crashing. Copies run at submit time, so buffer contents written through
/// staging uploads can be read back with
/// [`buffer_contents`](Self::buffer_contents).
#[derive(Debug, Default)]
pub struct NullVulkan {
    ledger: Ledger,
    failures: Failures<VkResult>,
    validation: Option<bool>,
    surface: VkHandle,
    lost: bool,
    validation_errors: usize,
    buffers: HashMap<VkHandle, BufferObject>,
    images: HashMap<VkHandle, ImageObject>,
    memory: HashMap<VkHandle, MemoryObject>,
    views: HashMap<VkHandle, VkHandle>,
    swapchains: HashMap<VkHandle, SwapchainObject>,
    set_layouts: HashMap<VkHandle, Vec<DescriptorSetLayoutBinding>>,
    pipeline_layouts: HashMap<VkHandle, VkHandle>,
    render_passes: HashMap<VkHandle, RenderPassCreateInfo>,
    framebuffers: HashMap<VkHandle, FramebufferObject>,
    pipelines: HashMap<VkHandle, PipelineObject>,
    pools: HashMap<VkHandle, Vec<VkHandle>>,
    command_buffers: HashMap<VkHandle, CommandBuffer>,
    semaphores: HashMap<VkHandle, bool>,
    fences: HashMap<VkHandle, bool>,
    /// Command buffers submitted but not yet observed complete, with the
    /// fence of their submission.
    pending: Vec<(VkHandle, VkHandle)>,
    uploaded_bytes: u64,
    presents: u64,
    /// Transfer and draw commands in the order the queue ran them.
    executed: Vec<String>,
}

impl NullVulkan {
    /// A driver with no instance created yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Objects, calls and per-draw snapshots.
    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    /// Failures to inject, keyed by entry point name.
    pub fn failures(&self) -> &Failures<VkResult> {
        &self.failures
    }

    /// Whether the instance was created with validation layers.
    pub fn validation_enabled(&self) -> Option<bool> {
        self.validation
    }

    /// Number of protocol violations reported so far.
    pub fn validation_errors(&self) -> usize {
        self.validation_errors
    }

    /// Whether an injected `VK_ERROR_DEVICE_LOST` has lost the device.
    pub fn is_lost(&self) -> bool {
        self.lost
    }

    /// The bytes of the memory bound to `buffer`.
    pub fn buffer_contents(&self, buffer: VkHandle) -> Option<&[u8]> {
        let object = self.buffers.get(&buffer)?;
        let memory = self.memory.get(&object.memory?)?;
        memory.bytes.get(..object.info.size as usize)
    }

    /// Total bytes copied from staging buffers into images.
    pub fn uploaded_bytes(&self) -> u64 {
        self.uploaded_bytes
    }

    /// Number of successful presents.
    pub fn presents(&self) -> u64 {
        self.presents
    }

    /// Copies and draws in execution order, across all submissions.
    pub fn executed(&self) -> &[String] {
        &self.executed
    }

    /// The create info of a live swapchain.
    pub fn swapchain_info(&self, swapchain: VkHandle) -> Option<&SwapchainCreateInfo> {
        self.swapchains.get(&swapchain).map(|object| &object.info)
    }

    fn report(&mut self, message: impl Display) {
        self.validation_errors += 1;
        log::error!("null vulkan: {message}");
    }

    fn enter(&mut self, entry_point: &'static str) -> Result<(), VkResult> {
        self.ledger.call(entry_point);
        match self.failures.take(entry_point) {
            Some(code) => {
                if code == VkResult::ERROR_DEVICE_LOST {
                    self.lost = true;
                }
                Err(code)
            }
            None => Ok(()),
        }
    }

    /// Like [`enter`](Self::enter) for queue and fence calls, which keep
    /// failing once the device is lost.
    fn enter_queue(&mut self, entry_point: &'static str) -> Result<(), VkResult> {
        self.enter(entry_point)?;
        if self.lost {
            return Err(VkResult::ERROR_DEVICE_LOST);
        }
        Ok(())
    }

    fn create(&mut self, entry_point: &'static str, kind: &'static str) -> Result<VkHandle, VkResult> {
        self.enter(entry_point)?;
        Ok(self.ledger.create(kind))
    }

    fn forget(&mut self, entry_point: &'static str, handle: VkHandle) {
        self.ledger.call(entry_point);
        if !self.ledger.destroy(handle) {
            self.validation_errors += 1;
        }
    }

    fn is(&self, handle: VkHandle, kind: &str) -> bool {
        self.ledger.kind(handle) == Some(kind)
    }

    /// Marks pending command buffers complete. With `fence` set, only the
    /// submissions signalling it complete.
    fn complete(&mut self, fence: Option<VkHandle>) {
        let (done, still_pending): (Vec<_>, Vec<_>) = self
            .pending
            .drain(..)
            .partition(|&(_, submitted)| fence.is_none_or(|fence| fence == submitted));
        self.pending = still_pending;
        for (command_buffer, _) in done {
            if let Some(object) = self.command_buffers.get_mut(&command_buffer) {
                object.state = if object.one_time {
                    CommandBufferState::Invalid
                } else {
                    CommandBufferState::Executable
                };
            }
        }
    }

    /// Checks that `command_buffer` is recording and that the render pass
    /// scope fits the command.
    fn command(&mut self, command_buffer: VkHandle, entry_point: &'static str, scope: Scope) -> bool {
        self.ledger.call(entry_point);
        let Some(object) = self.command_buffers.get(&command_buffer) else {
            self.report(format!("{entry_point}: unknown command buffer {command_buffer:#x}"));
            return false;
        };
        if object.state != CommandBufferState::Recording {
            let state = object.state;
            self.report(format!("{entry_point}: command buffer is {state:?}, not recording"));
            return false;
        }
        let inside = object.render_pass.is_some();
        match scope {
            Scope::Inside if !inside => {
                self.report(format!("{entry_point} outside a render pass"));
            }
            Scope::Outside if inside => {
                self.report(format!("{entry_point} inside a render pass"));
            }
            _ => {}
        }
        true
    }

    fn bind(&mut self, command_buffer: VkHandle, key: String, value: impl Debug) {
        if let Some(object) = self.command_buffers.get_mut(&command_buffer) {
            object.bound.insert(key, format!("{value:?}"));
        }
    }

    /// Validates a draw against the bound pipeline and records its snapshot.
    fn record_draw(&mut self, command_buffer: VkHandle, indexed: bool, args: String) {
        let Some(object) = self.command_buffers.get(&command_buffer) else {
            return;
        };
        let mut problems = Vec::new();
        match object
            .pipelines
            .get(&vk::PIPELINE_BIND_POINT_GRAPHICS)
            .and_then(|pipeline| self.pipelines.get(pipeline))
        {
            Some(pipeline) => {
                for binding in &pipeline.vertex_bindings {
                    if !object.vertex_buffers.contains(binding) {
                        problems.push(format!("vertex binding {binding} has no buffer"));
                    }
                }
            }
            None => problems.push("no graphics pipeline is bound".to_string()),
        }
        if indexed && !object.index_buffer {
            problems.push("no index buffer is bound".to_string());
        }
        for state in ["viewport", "scissor"] {
            if !object.bound.contains_key(state) {
                problems.push(format!("dynamic {state} was never set"));
            }
        }
        let mut snapshot = object.bound.clone();
        snapshot.insert("draw".to_string(), args.clone());
        self.ledger.record(snapshot);
        if let Some(object) = self.command_buffers.get_mut(&command_buffer) {
            object.commands.push(Command::Draw { args });
        }
        for problem in problems {
            self.report(problem);
        }
    }

    fn run(&mut self, commands: Vec<Command>) {
        for command in commands {
            match command {
                Command::CopyBuffer { src, dst, regions } => {
                    self.executed.push(format!("CopyBuffer({dst:#x})"));
                    let source = self
                        .buffers
                        .get(&src)
                        .and_then(|buffer| buffer.memory)
                        .and_then(|memory| self.memory.get(&memory))
                        .map(|memory| memory.bytes.clone());
                    let target = self.buffers.get(&dst).and_then(|buffer| buffer.memory);
                    let (Some(source), Some(target)) = (source, target) else {
                        self.report("vkCmdCopyBuffer on a buffer without memory");
                        continue;
                    };
                    if let Some(memory) = self.memory.get_mut(&target) {
                        for region in regions {
                            let (src, dst, len) = (
                                region.src_offset as usize,
                                region.dst_offset as usize,
                                region.size as usize,
                            );
                            memory.bytes[dst..dst + len].copy_from_slice(&source[src..src + len]);
                        }
                    }
                }
                Command::CopyBufferToImage { src } => {
                    self.executed.push("CopyBufferToImage".to_string());
                    if let Some(buffer) = self.buffers.get(&src) {
                        self.uploaded_bytes += buffer.info.size;
                    }
                }
                Command::Draw { args } => self.executed.push(args),
            }
        }
    }

    fn buffer_in_range(&self, buffer: VkHandle, offset: u64, size: u64) -> bool {
        self.buffers
            .get(&buffer)
            .is_some_and(|object| offset + size <= object.info.size)
    }
}

impl VulkanApi for NullVulkan {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn create_instance(&mut self, validation: bool) -> Result<(), VkResult> {
        self.enter("vkCreateInstance")?;
        self.validation = Some(validation);
        Ok(())
    }

    fn create_surface(&mut self, _surface: &SurfaceHandle) -> Result<VkHandle, VkResult> {
        if self.validation.is_none() {
            self.report("vkCreateSurfaceKHR before vkCreateInstance");
            return Err(VkResult::ERROR_INITIALIZATION_FAILED);
        }
        self.surface = self.create("vkCreateSurfaceKHR", "surface")?;
        Ok(self.surface)
    }

    fn create_device(&mut self, surface: VkHandle) -> Result<(), VkResult> {
        self.enter("vkCreateDevice")?;
        if surface != self.surface {
            self.report("no queue family can present to the surface");
            return Err(VkResult::ERROR_INITIALIZATION_FAILED);
        }
        Ok(())
    }

    fn memory_types(&self) -> Vec<u32> {
        MEMORY_TYPES.to_vec()
    }

    fn destroy_device(&mut self) {
        let surface = std::mem::take(&mut self.surface);
        self.forget("vkDestroySurfaceKHR", surface);
        self.ledger.call("vkDestroyDevice");
        let leaked = self.ledger.live_objects();
        if leaked > 0 {
            log::warn!("null vulkan: {leaked} objects alive at vkDestroyDevice");
        }
    }

    fn create_swapchain(&mut self, info: &SwapchainCreateInfo) -> Result<VkHandle, VkResult> {
        self.enter("vkCreateSwapchainKHR")?;
        if info.surface != self.surface {
            self.report("vkCreateSwapchainKHR on an unknown surface");
            return Err(VkResult::ERROR_SURFACE_LOST_KHR);
        }
        if info.old_swapchain != NULL_HANDLE && !self.swapchains.contains_key(&info.old_swapchain) {
            self.report("vkCreateSwapchainKHR with a dead oldSwapchain");
        }
        if info.extent.width == 0 || info.extent.height == 0 || info.min_image_count == 0 {
            self.report(format!("vkCreateSwapchainKHR with {info:?}"));
            return Err(VkResult::ERROR_INITIALIZATION_FAILED);
        }
        let handle = self.ledger.create("swapchain");
        let images = (0..info.min_image_count)
            .map(|_| self.ledger.create("swapchain image"))
            .collect::<Vec<_>>();
        for &image in &images {
            self.images.insert(image, ImageObject { info: None, memory: None });
        }
        let object = SwapchainObject {
            info: info.clone(),
            images,
            next: 0,
            acquired: Vec::new(),
        };
        self.swapchains.insert(handle, object);
        Ok(handle)
    }

    fn get_swapchain_images(&mut self, swapchain: VkHandle) -> Result<Vec<VkHandle>, VkResult> {
        self.enter("vkGetSwapchainImagesKHR")?;
        match self.swapchains.get(&swapchain) {
            Some(object) => Ok(object.images.clone()),
            None => {
                self.report("vkGetSwapchainImagesKHR on an unknown swapchain");
                Err(VkResult::ERROR_INITIALIZATION_FAILED)
            }
        }
    }

    fn destroy_swapchain(&mut self, swapchain: VkHandle) {
        if let Some(object) = self.swapchains.remove(&swapchain) {
            for image in object.images {
                if self.views.values().any(|&viewed| viewed == image) {
                    self.report("swapchain destroyed while views of its images are alive");
                }
                self.images.remove(&image);
                self.ledger.destroy(image);
            }
        }
        self.forget("vkDestroySwapchainKHR", swapchain);
    }

    fn acquire_next_image(&mut self, swapchain: VkHandle, semaphore: VkHandle) -> (VkResult, u32) {
        if let Err(result) = self.enter_queue("vkAcquireNextImageKHR") {
            return (result, 0);
        }
        match self.semaphores.get(&semaphore).copied() {
            Some(true) => self.report("vkAcquireNextImageKHR signals a semaphore that is already signaled"),
            Some(false) => {}
            None => self.report("vkAcquireNextImageKHR with an unknown semaphore"),
        }
        let Some(object) = self.swapchains.get_mut(&swapchain) else {
            self.report("vkAcquireNextImageKHR on an unknown swapchain");
            return (VkResult::ERROR_OUT_OF_DATE_KHR, 0);
        };
        let count = object.images.len() as u32;
        if object.acquired.len() as u32 >= count {
            self.report("every swapchain image is already acquired");
            return (VkResult::TIMEOUT, 0);
        }
        let index = object.next;
        object.next = (index + 1) % count;
        object.acquired.push(index);
        self.semaphores.insert(semaphore, true);
        (VkResult::SUCCESS, index)
    }

    fn queue_present(&mut self, swapchain: VkHandle, image_index: u32, wait_semaphore: VkHandle) -> VkResult {
        if let Err(result) = self.enter_queue("vkQueuePresentKHR") {
            return result;
        }
        if self.semaphores.get(&wait_semaphore) != Some(&true) {
            self.report("vkQueuePresentKHR waits on a semaphore nothing signals");
        }
        self.semaphores.insert(wait_semaphore, false);
        let Some(object) = self.swapchains.get_mut(&swapchain) else {
            self.report("vkQueuePresentKHR on an unknown swapchain");
            return VkResult::ERROR_OUT_OF_DATE_KHR;
        };
        match object.acquired.iter().position(|&index| index == image_index) {
            Some(position) => {
                object.acquired.remove(position);
                self.presents += 1;
                VkResult::SUCCESS
            }
            None => {
                self.report(format!("image {image_index} presented without being acquired"));
                VkResult::SUCCESS
            }
        }
    }

    fn create_buffer(&mut self, info: &BufferCreateInfo) -> Result<VkHandle, VkResult> {
        self.enter("vkCreateBuffer")?;
        if info.size == 0 || info.usage == 0 {
            self.report(format!("vkCreateBuffer with {info:?}"));
            return Err(VkResult::ERROR_INITIALIZATION_FAILED);
        }
        let handle = self.ledger.create("buffer");
        self.buffers.insert(handle, BufferObject { info: *info, memory: None });
        Ok(handle)
    }

    fn destroy_buffer(&mut self, buffer: VkHandle) {
        self.buffers.remove(&buffer);
        self.forget("vkDestroyBuffer", buffer);
    }

    fn buffer_memory_requirements(&self, buffer: VkHandle) -> MemoryRequirements {
        let size = self.buffers.get(&buffer).map_or(0, |object| object.info.size);
        MemoryRequirements {
            size: align(size),
            alignment: ALLOCATION_ALIGNMENT,
            memory_type_bits: 0b11,
        }
    }

    fn create_image(&mut self, info: &ImageCreateInfo) -> Result<VkHandle, VkResult> {
        self.enter("vkCreateImage")?;
        let extent = info.extent;
        let empty = extent.width == 0 || extent.height == 0 || extent.depth == 0;
        let partial_cube = info.flags & vk::IMAGE_CREATE_CUBE_COMPATIBLE != 0 && info.array_layers % 6 != 0;
        if empty || info.mip_levels == 0 || info.array_layers == 0 || partial_cube || info.usage == 0 {
            self.report(format!("vkCreateImage with {info:?}"));
            return Err(VkResult::ERROR_INITIALIZATION_FAILED);
        }
        let handle = self.ledger.create("image");
        let object = ImageObject {
            info: Some(*info),
            memory: None,
        };
        self.images.insert(handle, object);
        Ok(handle)
    }

    fn destroy_image(&mut self, image: VkHandle) {
        if self.images.get(&image).is_some_and(|object| object.info.is_none()) {
            self.report("vkDestroyImage on a swapchain image");
            return;
        }
        self.images.remove(&image);
        self.forget("vkDestroyImage", image);
    }

    fn image_memory_requirements(&self, image: VkHandle) -> MemoryRequirements {
        // Sixteen bytes per texel bounds every format in use, and a full mip
        // chain stays under twice the base level.
        let size = self
            .images
            .get(&image)
            .and_then(|object| object.info)
            .map_or(0, |info| {
                let texels = u64::from(info.extent.width)
                    * u64::from(info.extent.height)
                    * u64::from(info.extent.depth)
                    * u64::from(info.array_layers);
                let chain = if info.mip_levels > 1 { 2 } else { 1 };
                texels * 16 * chain
            });
        MemoryRequirements {
            size: align(size),
            alignment: ALLOCATION_ALIGNMENT,
            memory_type_bits: 0b01,
        }
    }

    fn allocate_memory(&mut self, size: u64, memory_type_index: u32) -> Result<VkHandle, VkResult> {
        self.enter("vkAllocateMemory")?;
        let Some(&properties) = MEMORY_TYPES.get(memory_type_index as usize) else {
            self.report(format!("memory type {memory_type_index} does not exist"));
            return Err(VkResult::ERROR_OUT_OF_DEVICE_MEMORY);
        };
        if size == 0 {
            self.report("vkAllocateMemory of zero bytes");
            return Err(VkResult::ERROR_OUT_OF_DEVICE_MEMORY);
        }
        let handle = self.ledger.create("memory");
        let object = MemoryObject {
            bytes: vec![0; size as usize],
            properties,
            mapped: false,
        };
        self.memory.insert(handle, object);
        Ok(handle)
    }

    fn free_memory(&mut self, memory: VkHandle) {
        self.memory.remove(&memory);
        self.forget("vkFreeMemory", memory);
    }

    fn bind_buffer_memory(&mut self, buffer: VkHandle, memory: VkHandle) -> VkResult {
        if let Err(result) = self.enter("vkBindBufferMemory") {
            return result;
        }
        let required = self.buffer_memory_requirements(buffer).size;
        let available = self.memory.get(&memory).map_or(0, |object| object.bytes.len() as u64);
        let bindable = self
            .buffers
            .get(&buffer)
            .is_some_and(|object| object.memory.is_none());
        if !bindable || available < required {
            self.report("vkBindBufferMemory with an unknown, bound or undersized object");
            return VkResult::ERROR_OUT_OF_DEVICE_MEMORY;
        }
        if let Some(object) = self.buffers.get_mut(&buffer) {
            object.memory = Some(memory);
        }
        VkResult::SUCCESS
    }

    fn bind_image_memory(&mut self, image: VkHandle, memory: VkHandle) -> VkResult {
        if let Err(result) = self.enter("vkBindImageMemory") {
            return result;
        }
        let required = self.image_memory_requirements(image).size;
        let available = self.memory.get(&memory).map_or(0, |object| object.bytes.len() as u64);
        let bindable = self
            .images
            .get(&image)
            .is_some_and(|object| object.info.is_some() && object.memory.is_none());
        if !bindable || available < required {
            self.report("vkBindImageMemory with an unknown, bound or undersized object");
            return VkResult::ERROR_OUT_OF_DEVICE_MEMORY;
        }
        if let Some(object) = self.images.get_mut(&image) {
            object.memory = Some(memory);
        }
        VkResult::SUCCESS
    }

    fn map_memory(&mut self, memory: VkHandle, offset: u64, size: u64) -> Result<NonNull<u8>, VkResult> {
        self.enter("vkMapMemory")?;
        let problem = match self.memory.get(&memory) {
            None => Some("unknown memory"),
            Some(object) if object.properties & vk::MEMORY_PROPERTY_HOST_VISIBLE == 0 => {
                Some("memory is not host visible")
            }
            Some(object) if object.mapped => Some("memory is already mapped"),
            Some(object) if offset + size > object.bytes.len() as u64 => Some("range exceeds the allocation"),
            Some(_) => None,
        };
        if let Some(problem) = problem {
            self.report(format!("vkMapMemory: {problem}"));
            return Err(VkResult::ERROR_MEMORY_MAP_FAILED);
        }
        let object = self
            .memory
            .get_mut(&memory)
            .ok_or(VkResult::ERROR_MEMORY_MAP_FAILED)?;
        object.mapped = true;
        NonNull::new(object.bytes[offset as usize..].as_mut_ptr()).ok_or(VkResult::ERROR_MEMORY_MAP_FAILED)
    }

    fn unmap_memory(&mut self, memory: VkHandle) {
        self.ledger.call("vkUnmapMemory");
        match self.memory.get_mut(&memory) {
            Some(object) if object.mapped => object.mapped = false,
            _ => self.report(format!("vkUnmapMemory of {memory:#x} which is not mapped")),
        }
    }

    fn create_image_view(&mut self, info: &ImageViewCreateInfo) -> Result<VkHandle, VkResult> {
        self.enter("vkCreateImageView")?;
        let range = info.subresource_range;
        let valid = match self.images.get(&info.image) {
            None => false,
            Some(ImageObject { info: None, .. }) => true,
            Some(ImageObject { info: Some(image), .. }) => {
                range.base_mip_level < image.mip_levels && range.base_array_layer < image.array_layers
            }
        };
        if !valid {
            self.report(format!("vkCreateImageView with {info:?}"));
            return Err(VkResult::ERROR_INITIALIZATION_FAILED);
        }
        let handle = self.ledger.create("image view");
        self.views.insert(handle, info.image);
        Ok(handle)
    }

    fn destroy_image_view(&mut self, view: VkHandle) {
        self.views.remove(&view);
        self.forget("vkDestroyImageView", view);
    }

    fn create_sampler(&mut self, info: &SamplerCreateInfo) -> Result<VkHandle, VkResult> {
        if info.anisotropy_enable && info.max_anisotropy > 16.0 {
            self.ledger.call("vkCreateSampler");
            self.report("maxAnisotropy above the device limit");
            return Err(VkResult::ERROR_INITIALIZATION_FAILED);
        }
        self.create("vkCreateSampler", "sampler")
    }

    fn destroy_sampler(&mut self, sampler: VkHandle) {
        self.forget("vkDestroySampler", sampler);
    }

    fn create_shader_module(&mut self, code: &[u32]) -> Result<VkHandle, VkResult> {
        self.enter("vkCreateShaderModule")?;
        if code.first() != Some(&SPIRV_MAGIC) {
            self.report("vkCreateShaderModule: code is not SPIR-V");
            return Err(VkResult::ERROR_INITIALIZATION_FAILED);
        }
        Ok(self.ledger.create("shader module"))
    }

    fn destroy_shader_module(&mut self, module: VkHandle) {
        self.forget("vkDestroyShaderModule", module);
    }

    fn create_push_descriptor_set_layout(&mut self, bindings: &[DescriptorSetLayoutBinding]) -> Result<VkHandle, VkResult> {
        self.enter("vkCreateDescriptorSetLayout")?;
        for (index, binding) in bindings.iter().enumerate() {
            if bindings[..index].iter().any(|other| other.binding == binding.binding) {
                self.report(format!("binding {} declared twice", binding.binding));
                return Err(VkResult::ERROR_INITIALIZATION_FAILED);
            }
        }
        let handle = self.ledger.create("descriptor set layout");
        self.set_layouts.insert(handle, bindings.to_vec());
        Ok(handle)
    }

    fn destroy_descriptor_set_layout(&mut self, layout: VkHandle) {
        self.set_layouts.remove(&layout);
        self.forget("vkDestroyDescriptorSetLayout", layout);
    }

    fn create_pipeline_layout(&mut self, set_layout: VkHandle) -> Result<VkHandle, VkResult> {
        self.enter("vkCreatePipelineLayout")?;
        if !self.set_layouts.contains_key(&set_layout) {
            self.report("vkCreatePipelineLayout with an unknown set layout");
            return Err(VkResult::ERROR_INITIALIZATION_FAILED);
        }
        let handle = self.ledger.create("pipeline layout");
        self.pipeline_layouts.insert(handle, set_layout);
        Ok(handle)
    }

    fn destroy_pipeline_layout(&mut self, layout: VkHandle) {
        self.pipeline_layouts.remove(&layout);
        self.forget("vkDestroyPipelineLayout", layout);
    }

    fn create_render_pass(&mut self, info: &RenderPassCreateInfo) -> Result<VkHandle, VkResult> {
        self.enter("vkCreateRenderPass")?;
        let handle = self.ledger.create("render pass");
        self.render_passes.insert(handle, info.clone());
        Ok(handle)
    }

    fn destroy_render_pass(&mut self, render_pass: VkHandle) {
        self.render_passes.remove(&render_pass);
        self.forget("vkDestroyRenderPass", render_pass);
    }

    fn create_framebuffer(&mut self, render_pass: VkHandle, attachments: &[VkHandle], extent: Extent2D) -> Result<VkHandle, VkResult> {
        self.enter("vkCreateFramebuffer")?;
        let expected = self
            .render_passes
            .get(&render_pass)
            .map(|info| info.color_attachments.len() + usize::from(info.depth_stencil_attachment.is_some()));
        let views_alive = attachments.iter().all(|view| self.views.contains_key(view));
        if expected != Some(attachments.len()) || !views_alive || extent.width == 0 || extent.height == 0 {
            self.report("vkCreateFramebuffer does not match its render pass");
            return Err(VkResult::ERROR_INITIALIZATION_FAILED);
        }
        let handle = self.ledger.create("framebuffer");
        self.framebuffers.insert(handle, FramebufferObject { render_pass, extent });
        Ok(handle)
    }

    fn destroy_framebuffer(&mut self, framebuffer: VkHandle) {
        self.framebuffers.remove(&framebuffer);
        self.forget("vkDestroyFramebuffer", framebuffer);
    }

    fn create_graphics_pipeline(&mut self, info: &GraphicsPipelineCreateInfo) -> Result<VkHandle, VkResult> {
        self.enter("vkCreateGraphicsPipelines")?;
        let mut problems = Vec::new();
        if !self.pipeline_layouts.contains_key(&info.layout) {
            problems.push("unknown pipeline layout".to_string());
        }
        match self.render_passes.get(&info.render_pass) {
            Some(pass) if pass.color_attachments.len() != info.color_blend_attachments.len() => problems.push(format!(
                "{} blend attachments for {} color attachments",
                info.color_blend_attachments.len(),
                pass.color_attachments.len()
            )),
            Some(_) => {}
            None => problems.push("unknown render pass".to_string()),
        }
        if !info.stages.iter().any(|stage| stage.stage == vk::SHADER_STAGE_VERTEX) {
            problems.push("no vertex stage".to_string());
        }
        for stage in &info.stages {
            if !self.is(stage.module, "shader module") {
                problems.push(format!("stage {:#x} uses a dead module", stage.stage));
            }
        }
        for attribute in &info.vertex_attributes {
            if !info.vertex_bindings.iter().any(|binding| binding.binding == attribute.binding) {
                problems.push(format!("location {} reads an undeclared binding", attribute.location));
            }
        }
        if !problems.is_empty() {
            for problem in problems {
                self.report(format!("vkCreateGraphicsPipelines: {problem}"));
            }
            return Err(VkResult::ERROR_INITIALIZATION_FAILED);
        }
        let handle = self.ledger.create("pipeline");
        let object = PipelineObject {
            bind_point: vk::PIPELINE_BIND_POINT_GRAPHICS,
            description: format!("{info:?}"),
            vertex_bindings: info.vertex_bindings.iter().map(|binding| binding.binding).collect(),
        };
        self.pipelines.insert(handle, object);
        Ok(handle)
    }

    fn create_compute_pipeline(&mut self, info: &ComputePipelineCreateInfo) -> Result<VkHandle, VkResult> {
        self.enter("vkCreateComputePipelines")?;
        let valid = info.stage.stage == vk::SHADER_STAGE_COMPUTE
            && self.is(info.stage.module, "shader module")
            && self.pipeline_layouts.contains_key(&info.layout);
        if !valid {
            self.report(format!("vkCreateComputePipelines with {info:?}"));
            return Err(VkResult::ERROR_INITIALIZATION_FAILED);
        }
        let handle = self.ledger.create("pipeline");
        let object = PipelineObject {
            bind_point: vk::PIPELINE_BIND_POINT_COMPUTE,
            description: format!("{info:?}"),
            vertex_bindings: Vec::new(),
        };
        self.pipelines.insert(handle, object);
        Ok(handle)
    }

    fn destroy_pipeline(&mut self, pipeline: VkHandle) {
        self.pipelines.remove(&pipeline);
        self.forget("vkDestroyPipeline", pipeline);
    }

    fn create_command_pool(&mut self) -> Result<VkHandle, VkResult> {
        let handle = self.create("vkCreateCommandPool", "command pool")?;
        self.pools.insert(handle, Vec::new());
        Ok(handle)
    }

    fn destroy_command_pool(&mut self, pool: VkHandle) {
        for command_buffer in self.pools.remove(&pool).unwrap_or_default() {
            if let Some(object) = self.command_buffers.remove(&command_buffer) {
                if object.state == CommandBufferState::Pending {
                    self.report("command pool destroyed with a pending command buffer");
                }
            }
            self.ledger.destroy(command_buffer);
        }
        self.forget("vkDestroyCommandPool", pool);
    }

    fn allocate_command_buffers(&mut self, pool: VkHandle, count: u32) -> Result<Vec<VkHandle>, VkResult> {
        self.enter("vkAllocateCommandBuffers")?;
        if !self.pools.contains_key(&pool) {
            self.report("vkAllocateCommandBuffers from an unknown pool");
            return Err(VkResult::ERROR_INITIALIZATION_FAILED);
        }
        let handles: Vec<VkHandle> = (0..count).map(|_| self.ledger.create("command buffer")).collect();
        for &handle in &handles {
            self.command_buffers.insert(handle, CommandBuffer::new());
        }
        if let Some(allocated) = self.pools.get_mut(&pool) {
            allocated.extend(&handles);
        }
        Ok(handles)
    }

    fn reset_command_buffer(&mut self, command_buffer: VkHandle) -> VkResult {
        if let Err(result) = self.enter("vkResetCommandBuffer") {
            return result;
        }
        match self.command_buffers.get(&command_buffer).map(|object| object.state) {
            Some(CommandBufferState::Pending) => {
                self.report("vkResetCommandBuffer on a pending command buffer");
                return VkResult::SUCCESS;
            }
            Some(_) => {}
            None => {
                self.report("vkResetCommandBuffer on an unknown command buffer");
                return VkResult::SUCCESS;
            }
        }
        if let Some(object) = self.command_buffers.get_mut(&command_buffer) {
            object.restart(CommandBufferState::Initial);
        }
        VkResult::SUCCESS
    }

    fn begin_command_buffer(&mut self, command_buffer: VkHandle, one_time_submit: bool) -> VkResult {
        if let Err(result) = self.enter("vkBeginCommandBuffer") {
            return result;
        }
        match self.command_buffers.get(&command_buffer).map(|object| object.state) {
            Some(CommandBufferState::Pending | CommandBufferState::Recording) => {
                self.report("vkBeginCommandBuffer on a pending or recording command buffer");
                return VkResult::SUCCESS;
            }
            Some(_) => {}
            None => {
                self.report("vkBeginCommandBuffer on an unknown command buffer");
                return VkResult::SUCCESS;
            }
        }
        if let Some(object) = self.command_buffers.get_mut(&command_buffer) {
            object.restart(CommandBufferState::Recording);
            object.one_time = one_time_submit;
        }
        VkResult::SUCCESS
    }

    fn end_command_buffer(&mut self, command_buffer: VkHandle) -> VkResult {
        if let Err(result) = self.enter("vkEndCommandBuffer") {
            return result;
        }
        let Some(object) = self.command_buffers.get_mut(&command_buffer) else {
            self.report("vkEndCommandBuffer on an unknown command buffer");
            return VkResult::SUCCESS;
        };
        let (state, in_pass) = (object.state, object.render_pass.is_some());
        object.state = CommandBufferState::Executable;
        if state != CommandBufferState::Recording {
            self.report(format!("vkEndCommandBuffer on a {state:?} command buffer"));
        } else if in_pass {
            self.report("vkEndCommandBuffer inside a render pass");
        }
        VkResult::SUCCESS
    }

    fn cmd_begin_render_pass(&mut self, command_buffer: VkHandle, render_pass: VkHandle, framebuffer: VkHandle, extent: Extent2D) {
        if !self.command(command_buffer, "vkCmdBeginRenderPass", Scope::Outside) {
            return;
        }
        let compatible = match (self.render_passes.get(&render_pass), self.framebuffers.get(&framebuffer)) {
            (Some(pass), Some(target)) => {
                let fits = extent.width <= target.extent.width && extent.height <= target.extent.height;
                fits && self.render_passes.get(&target.render_pass) == Some(pass)
            }
            _ => false,
        };
        if !compatible {
            self.report("vkCmdBeginRenderPass with an incompatible framebuffer");
        }
        let description = self.render_passes.get(&render_pass).map(|info| format!("{info:?}"));
        if let Some(object) = self.command_buffers.get_mut(&command_buffer) {
            object.render_pass = Some(render_pass);
        }
        self.bind(command_buffer, "render pass".to_string(), (description, extent));
    }

    fn cmd_end_render_pass(&mut self, command_buffer: VkHandle) {
        if !self.command(command_buffer, "vkCmdEndRenderPass", Scope::Inside) {
            return;
        }
        if let Some(object) = self.command_buffers.get_mut(&command_buffer) {
            object.render_pass = None;
        }
    }

    fn cmd_bind_pipeline(&mut self, command_buffer: VkHandle, bind_point: u32, pipeline: VkHandle) {
        if !self.command(command_buffer, "vkCmdBindPipeline", Scope::Any) {
            return;
        }
        let description = match self.pipelines.get(&pipeline) {
            Some(object) if object.bind_point == bind_point => object.description.clone(),
            Some(_) => {
                self.report("vkCmdBindPipeline at the wrong bind point");
                return;
            }
            None => {
                self.report("vkCmdBindPipeline with an unknown pipeline");
                return;
            }
        };
        if let Some(object) = self.command_buffers.get_mut(&command_buffer) {
            object.pipelines.insert(bind_point, pipeline);
            object.bound.insert(format!("pipeline {bind_point}"), description);
        }
    }

    fn cmd_bind_vertex_buffer(&mut self, command_buffer: VkHandle, binding: u32, buffer: VkHandle, offset: u64) {
        if !self.command(command_buffer, "vkCmdBindVertexBuffers", Scope::Any) {
            return;
        }
        if !self.buffers.contains_key(&buffer) {
            self.report("vkCmdBindVertexBuffers with an unknown buffer");
        }
        if let Some(object) = self.command_buffers.get_mut(&command_buffer) {
            if !object.vertex_buffers.contains(&binding) {
                object.vertex_buffers.push(binding);
            }
        }
        self.bind(command_buffer, format!("vertex buffer {binding}"), (buffer, offset));
    }

    fn cmd_bind_index_buffer(&mut self, command_buffer: VkHandle, buffer: VkHandle, offset: u64, index_type: u32) {
        if !self.command(command_buffer, "vkCmdBindIndexBuffer", Scope::Any) {
            return;
        }
        if !self.buffers.contains_key(&buffer) {
            self.report("vkCmdBindIndexBuffer with an unknown buffer");
        }
        if let Some(object) = self.command_buffers.get_mut(&command_buffer) {
            object.index_buffer = true;
        }
        self.bind(command_buffer, "index buffer".to_string(), (buffer, offset, index_type));
    }

    fn cmd_push_descriptor_set(&mut self, command_buffer: VkHandle, bind_point: u32, layout: VkHandle, set: u32, writes: &[DescriptorWrite]) {
        if !self.command(command_buffer, "vkCmdPushDescriptorSetKHR", Scope::Any) {
            return;
        }
        if set != 0 {
            self.report(format!("push descriptors to set {set}"));
        }
        let declared = self
            .pipeline_layouts
            .get(&layout)
            .and_then(|set_layout| self.set_layouts.get(set_layout))
            .map(|bindings| bindings.iter().map(|binding| binding.binding).collect::<Vec<_>>());
        let Some(declared) = declared else {
            self.report("vkCmdPushDescriptorSetKHR with an unknown layout");
            return;
        };
        for write in writes {
            if !declared.contains(&write.binding()) {
                self.report(format!("binding {} is not in the set layout", write.binding()));
            }
            let alive = match *write {
                DescriptorWrite::Buffer { buffer, offset, range, .. } => self.buffer_in_range(buffer, offset, range),
                DescriptorWrite::CombinedImageSampler { image_view, sampler, .. } => {
                    self.views.contains_key(&image_view) && self.is(sampler, "sampler")
                }
            };
            if !alive {
                self.report(format!("descriptor {write:?} references a dead or short object"));
            }
            self.bind(command_buffer, format!("descriptor {bind_point}.{}", write.binding()), write);
        }
    }

    fn cmd_set_viewport(&mut self, command_buffer: VkHandle, extent: Extent2D) {
        if self.command(command_buffer, "vkCmdSetViewport", Scope::Any) {
            self.bind(command_buffer, "viewport".to_string(), extent);
        }
    }

    fn cmd_set_scissor(&mut self, command_buffer: VkHandle, extent: Extent2D) {
        if self.command(command_buffer, "vkCmdSetScissor", Scope::Any) {
            self.bind(command_buffer, "scissor".to_string(), extent);
        }
    }

    fn cmd_set_stencil_reference(&mut self, command_buffer: VkHandle, reference: u32) {
        if self.command(command_buffer, "vkCmdSetStencilReference", Scope::Any) {
            self.bind(command_buffer, "stencil reference".to_string(), reference);
        }
    }

    fn cmd_set_blend_constants(&mut self, command_buffer: VkHandle, constants: [f32; 4]) {
        if self.command(command_buffer, "vkCmdSetBlendConstants", Scope::Any) {
            self.bind(command_buffer, "blend constants".to_string(), constants);
        }
    }

    fn cmd_clear_attachments(&mut self, command_buffer: VkHandle, attachments: &[ClearAttachment], _extent: Extent2D) {
        if !self.command(command_buffer, "vkCmdClearAttachments", Scope::Inside) {
            return;
        }
        if attachments.is_empty() {
            self.report("vkCmdClearAttachments with nothing to clear");
        }
    }

    fn cmd_draw(&mut self, command_buffer: VkHandle, vertex_count: u32, instance_count: u32, first_vertex: u32, first_instance: u32) {
        if self.command(command_buffer, "vkCmdDraw", Scope::Inside) {
            self.record_draw(
                command_buffer,
                false,
                format!("Draw({vertex_count}, {instance_count}, {first_vertex}, {first_instance})"),
            );
        }
    }

    fn cmd_draw_indexed(&mut self, command_buffer: VkHandle, index_count: u32, instance_count: u32, first_index: u32, vertex_offset: i32, first_instance: u32) {
        if self.command(command_buffer, "vkCmdDrawIndexed", Scope::Inside) {
            self.record_draw(
                command_buffer,
                true,
                format!("DrawIndexed({index_count}, {instance_count}, {first_index}, {vertex_offset}, {first_instance})"),
            );
        }
    }

    fn cmd_dispatch(&mut self, command_buffer: VkHandle, x: u32, y: u32, z: u32) {
        if !self.command(command_buffer, "vkCmdDispatch", Scope::Outside) {
            return;
        }
        let Some(object) = self.command_buffers.get(&command_buffer) else {
            return;
        };
        let bound = object.pipelines.contains_key(&vk::PIPELINE_BIND_POINT_COMPUTE);
        let mut snapshot = object.bound.clone();
        snapshot.insert("draw".to_string(), format!("Dispatch({x}, {y}, {z})"));
        self.ledger.record(snapshot);
        if !bound {
            self.report("vkCmdDispatch without a compute pipeline");
        }
    }

    fn cmd_copy_buffer(&mut self, command_buffer: VkHandle, src: VkHandle, dst: VkHandle, regions: &[BufferCopy]) {
        if !self.command(command_buffer, "vkCmdCopyBuffer", Scope::Outside) {
            return;
        }
        let in_range = regions.iter().all(|region| {
            self.buffer_in_range(src, region.src_offset, region.size)
                && self.buffer_in_range(dst, region.dst_offset, region.size)
        });
        if !in_range {
            self.report("vkCmdCopyBuffer region outside a buffer");
            return;
        }
        if let Some(object) = self.command_buffers.get_mut(&command_buffer) {
            object.commands.push(Command::CopyBuffer {
                src,
                dst,
                regions: regions.to_vec(),
            });
        }
    }

    fn cmd_copy_buffer_to_image(&mut self, command_buffer: VkHandle, src: VkHandle, dst: VkHandle, dst_layout: u32, regions: &[BufferImageCopy]) {
        if !self.command(command_buffer, "vkCmdCopyBufferToImage", Scope::Outside) {
            return;
        }
        if dst_layout != vk::IMAGE_LAYOUT_TRANSFER_DST_OPTIMAL && dst_layout != vk::IMAGE_LAYOUT_GENERAL {
            self.report("vkCmdCopyBufferToImage into an image that is not a transfer destination");
        }
        let image = self.images.get(&dst).and_then(|object| object.info);
        let in_range = image.is_some_and(|info| {
            regions.iter().all(|region| {
                region.mip_level < info.mip_levels && region.base_array_layer < info.array_layers
            })
        });
        if !in_range || !self.buffers.contains_key(&src) {
            self.report("vkCmdCopyBufferToImage with an unknown object or subresource");
            return;
        }
        if let Some(object) = self.command_buffers.get_mut(&command_buffer) {
            object.commands.push(Command::CopyBufferToImage { src });
        }
    }

    fn cmd_pipeline_barrier(&mut self, command_buffer: VkHandle, _src_stage_mask: u32, _dst_stage_mask: u32, image_barriers: &[ImageMemoryBarrier]) {
        if !self.command(command_buffer, "vkCmdPipelineBarrier", Scope::Outside) {
            return;
        }
        for barrier in image_barriers {
            if !self.images.contains_key(&barrier.image) {
                self.report(format!("barrier on unknown image {:#x}", barrier.image));
            }
        }
    }

    fn create_semaphore(&mut self) -> Result<VkHandle, VkResult> {
        let handle = self.create("vkCreateSemaphore", "semaphore")?;
        self.semaphores.insert(handle, false);
        Ok(handle)
    }

    fn destroy_semaphore(&mut self, semaphore: VkHandle) {
        self.semaphores.remove(&semaphore);
        self.forget("vkDestroySemaphore", semaphore);
    }

    fn create_fence(&mut self, signaled: bool) -> Result<VkHandle, VkResult> {
        let handle = self.create("vkCreateFence", "fence")?;
        self.fences.insert(handle, signaled);
        Ok(handle)
    }

    fn destroy_fence(&mut self, fence: VkHandle) {
        if self.pending.iter().any(|&(_, submitted)| submitted == fence) {
            self.report("fence destroyed while its submission is pending");
        }
        self.fences.remove(&fence);
        self.forget("vkDestroyFence", fence);
    }

    fn wait_for_fence(&mut self, fence: VkHandle, _timeout: u64) -> VkResult {
        if let Err(result) = self.enter_queue("vkWaitForFences") {
            return result;
        }
        match self.fences.get(&fence).copied() {
            Some(true) => {
                self.complete(Some(fence));
                VkResult::SUCCESS
            }
            Some(false) => {
                self.report("vkWaitForFences on a fence no submission signals");
                VkResult::TIMEOUT
            }
            None => {
                self.report("vkWaitForFences on an unknown fence");
                VkResult::TIMEOUT
            }
        }
    }

    fn reset_fence(&mut self, fence: VkHandle) -> VkResult {
        if let Err(result) = self.enter("vkResetFences") {
            return result;
        }
        if self.pending.iter().any(|&(_, submitted)| submitted == fence) {
            self.report("vkResetFences on a fence of a pending submission");
        }
        match self.fences.get_mut(&fence) {
            Some(signaled) => *signaled = false,
            None => self.report("vkResetFences on an unknown fence"),
        }
        VkResult::SUCCESS
    }

    fn queue_submit(&mut self, submit: &SubmitInfo, fence: VkHandle) -> VkResult {
        if let Err(result) = self.enter_queue("vkQueueSubmit") {
            return result;
        }
        let state = self.command_buffers.get(&submit.command_buffer).map(|object| object.state);
        if state != Some(CommandBufferState::Executable) {
            self.report(format!("vkQueueSubmit of a command buffer in state {state:?}"));
            return VkResult::SUCCESS;
        }
        if let Some((semaphore, _stage)) = submit.wait_semaphore {
            if self.semaphores.get(&semaphore) != Some(&true) {
                self.report("vkQueueSubmit waits on a semaphore nothing signals");
            }
            self.semaphores.insert(semaphore, false);
        }
        if let Some(semaphore) = submit.signal_semaphore {
            if self.semaphores.get(&semaphore) == Some(&true) {
                self.report("vkQueueSubmit signals a semaphore that is already signaled");
            }
            self.semaphores.insert(semaphore, true);
        }
        if fence != NULL_HANDLE {
            match self.fences.get_mut(&fence) {
                Some(signaled) if !*signaled => *signaled = true,
                _ => self.report("vkQueueSubmit with an unknown or signaled fence"),
            }
        }

        let commands = self
            .command_buffers
            .get_mut(&submit.command_buffer)
            .map(|object| {
                object.state = CommandBufferState::Pending;
                std::mem::take(&mut object.commands)
            })
            .unwrap_or_default();
        self.run(commands);
        self.pending.push((submit.command_buffer, fence));
        VkResult::SUCCESS
    }

    fn queue_wait_idle(&mut self) -> VkResult {
        if let Err(result) = self.enter_queue("vkQueueWaitIdle") {
            return result;
        }
        self.complete(None);
        VkResult::SUCCESS
    }

    fn device_wait_idle(&mut self) -> VkResult {
        if let Err(result) = self.enter_queue("vkDeviceWaitIdle") {
            return result;
        }
        self.complete(None);
        VkResult::SUCCESS
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device() -> NullVulkan {
        let mut api = NullVulkan::new();
        api.create_instance(true).unwrap();
        let surface = api.create_surface(&SurfaceHandle::web_canvas(1)).unwrap();
        api.create_device(surface).unwrap();
        api
    }

    fn host_buffer(api: &mut NullVulkan, size: u64) -> VkHandle {
        let buffer = api
            .create_buffer(&BufferCreateInfo {
                size,
                usage: vk::BUFFER_USAGE_TRANSFER_SRC | vk::BUFFER_USAGE_TRANSFER_DST,
            })
            .unwrap();
        let requirements = api.buffer_memory_requirements(buffer);
        let memory = api.allocate_memory(requirements.size, 1).unwrap();
        assert_eq!(api.bind_buffer_memory(buffer, memory), VkResult::SUCCESS);
        buffer
    }

    #[test]
    fn copies_run_at_submit() {
        let mut api = device();
        let src = host_buffer(&mut api, 4);
        let dst = host_buffer(&mut api, 4);
        let memory = api.buffers[&src].memory.unwrap();
        let ptr = api.map_memory(memory, 0, 4).unwrap();
        unsafe { std::ptr::copy_nonoverlapping([1u8, 2, 3, 4].as_ptr(), ptr.as_ptr(), 4) };
        api.unmap_memory(memory);

        let pool = api.create_command_pool().unwrap();
        let cb = api.allocate_command_buffers(pool, 1).unwrap()[0];
        assert_eq!(api.begin_command_buffer(cb, true), VkResult::SUCCESS);
        api.cmd_copy_buffer(cb, src, dst, &[BufferCopy { src_offset: 1, dst_offset: 0, size: 3 }]);
        assert_eq!(api.end_command_buffer(cb), VkResult::SUCCESS);
        let submit = SubmitInfo {
            command_buffer: cb,
            wait_semaphore: None,
            signal_semaphore: None,
        };
        assert_eq!(api.queue_submit(&submit, NULL_HANDLE), VkResult::SUCCESS);
        assert_eq!(api.queue_wait_idle(), VkResult::SUCCESS);

        assert_eq!(api.buffer_contents(dst), Some(&[2, 3, 4, 0][..]));
        assert_eq!(api.validation_errors(), 0);
    }

    #[test]
    fn resetting_a_pending_command_buffer_is_reported() {
        let mut api = device();
        let pool = api.create_command_pool().unwrap();
        let cb = api.allocate_command_buffers(pool, 1).unwrap()[0];
        let fence = api.create_fence(false).unwrap();
        api.begin_command_buffer(cb, true);
        api.end_command_buffer(cb);
        let submit = SubmitInfo {
            command_buffer: cb,
            wait_semaphore: None,
            signal_semaphore: None,
        };
        api.queue_submit(&submit, fence);

        api.reset_command_buffer(cb);
        assert_eq!(api.validation_errors(), 1);

        assert_eq!(api.wait_for_fence(fence, u64::MAX), VkResult::SUCCESS);
        api.reset_command_buffer(cb);
        assert_eq!(api.validation_errors(), 1);
    }

    #[test]
    fn injected_device_loss_sticks() {
        let mut api = device();
        api.failures().arm("vkQueueWaitIdle", VkResult::ERROR_DEVICE_LOST);
        assert_eq!(api.queue_wait_idle(), VkResult::ERROR_DEVICE_LOST);
        assert!(api.is_lost());
        assert_eq!(api.device_wait_idle(), VkResult::ERROR_DEVICE_LOST);
    }

    #[test]
    fn shader_modules_need_the_spirv_magic() {
        let mut api = device();
        assert!(api.create_shader_module(&[SPIRV_MAGIC, 0x0001_0000, 0, 1, 0]).is_ok());
        assert_eq!(
            api.create_shader_module(&[0xDEAD_BEEF]),
            Err(VkResult::ERROR_INITIALIZATION_FAILED)
        );
    }
}
