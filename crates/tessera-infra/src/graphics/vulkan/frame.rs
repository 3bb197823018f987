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

//! The per-frame synchronization protocol of the explicit backend.
//!
//! A frame walks `ImageAcquired -> Recording -> Submitted -> Presented` and
//! the next acquire starts the following frame. Any out-of-order transition
//! is a protocol violation: the machine becomes [`FramePhase::Lost`] and
//! stays there, and every later query reports the device as lost.

use super::api::VkResult;
use tessera_core::renderer::DeviceError;

/// Where the current frame is in the protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FramePhase {
    /// An image index was acquired; nothing has been recorded yet.
    ImageAcquired,
    /// The command buffer of the acquired image is being recorded.
    Recording,
    /// The command buffer was submitted and the fence armed.
    Submitted,
    /// The image was queued for presentation; the next acquire is due.
    Presented,
    /// A native call failed or the protocol was violated. Terminal.
    Lost,
}

/// Tracks the phase of the current frame and the acquired image index.
#[derive(Debug, Clone)]
pub struct FrameSync {
    phase: FramePhase,
    image_index: u32,
}

impl Default for FrameSync {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameSync {
    /// A machine waiting for its first acquire.
    pub fn new() -> Self {
        Self {
            phase: FramePhase::Presented,
            image_index: 0,
        }
    }

    /// The current phase.
    pub fn phase(&self) -> FramePhase {
        self.phase
    }

    /// The image index of the current frame.
    pub fn image_index(&self) -> u32 {
        self.image_index
    }

    /// Returns `true` once the device is lost.
    pub fn is_lost(&self) -> bool {
        self.phase == FramePhase::Lost
    }

    /// Fails with a device-lost error if the machine is [`FramePhase::Lost`].
    pub fn ensure_alive(&self, operation: &'static str) -> Result<(), DeviceError> {
        if self.is_lost() {
            return Err(DeviceError::new(
                operation,
                VkResult::ERROR_DEVICE_LOST.0 as i64,
                "device lost",
            ));
        }
        Ok(())
    }

    /// Enters the terminal state.
    pub fn lose(&mut self) {
        self.phase = FramePhase::Lost;
    }

    fn advance(
        &mut self,
        from: FramePhase,
        to: FramePhase,
        operation: &'static str,
    ) -> Result<(), DeviceError> {
        self.ensure_alive(operation)?;
        if self.phase != from {
            let current = self.phase;
            self.lose();
            return Err(DeviceError::new(
                operation,
                VkResult::ERROR_DEVICE_LOST.0 as i64,
                format!("frame protocol violation: {to:?} requested while {current:?}"),
            ));
        }
        self.phase = to;
        Ok(())
    }

    /// `Presented -> ImageAcquired`.
    pub fn acquired(&mut self, image_index: u32) -> Result<(), DeviceError> {
        self.advance(FramePhase::Presented, FramePhase::ImageAcquired, "vkAcquireNextImageKHR")?;
        self.image_index = image_index;
        Ok(())
    }

    /// `ImageAcquired -> Recording`.
    pub fn begin_recording(&mut self) -> Result<(), DeviceError> {
        self.advance(FramePhase::ImageAcquired, FramePhase::Recording, "vkBeginCommandBuffer")
    }

    /// `Recording -> Submitted`.
    pub fn submitted(&mut self) -> Result<(), DeviceError> {
        self.advance(FramePhase::Recording, FramePhase::Submitted, "vkQueueSubmit")
    }

    /// `Submitted -> Presented`.
    pub fn presented(&mut self) -> Result<(), DeviceError> {
        self.advance(FramePhase::Submitted, FramePhase::Presented, "vkQueuePresentKHR")
    }

    /// Abandons the current frame after the swapchain was recreated. Any
    /// phase but `Lost` returns to waiting for an acquire.
    pub fn restart(&mut self) -> Result<(), DeviceError> {
        self.ensure_alive("vkCreateSwapchainKHR")?;
        self.phase = FramePhase::Presented;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn acquired() -> FrameSync {
        let mut sync = FrameSync::new();
        sync.acquired(1).unwrap();
        sync
    }

    #[test]
    fn full_frame_cycles_back_to_acquire() {
        let mut sync = acquired();
        assert_eq!(sync.image_index(), 1);
        sync.begin_recording().unwrap();
        sync.submitted().unwrap();
        sync.presented().unwrap();
        sync.acquired(2).unwrap();
        assert_eq!(sync.phase(), FramePhase::ImageAcquired);
        assert_eq!(sync.image_index(), 2);
    }

    #[test]
    fn out_of_order_transition_is_fatal() {
        let mut sync = acquired();
        let err = sync.submitted().unwrap_err();
        assert_eq!(err.operation, "vkQueueSubmit");
        assert_eq!(err.status, -4);
        assert!(sync.is_lost());
    }

    #[test]
    fn lost_is_terminal() {
        let mut sync = acquired();
        sync.lose();
        assert!(sync.begin_recording().is_err());
        assert!(sync.restart().is_err());
        assert!(sync.acquired(0).is_err());
        let err = sync.ensure_alive("vkCmdDraw").unwrap_err();
        assert_eq!(err.message, "device lost");
        assert_eq!(sync.phase(), FramePhase::Lost);
    }

    #[test]
    fn restart_abandons_a_recording_frame() {
        let mut sync = acquired();
        sync.begin_recording().unwrap();
        sync.restart().unwrap();
        assert_eq!(sync.phase(), FramePhase::Presented);
        sync.acquired(0).unwrap();
    }

    #[test]
    fn double_acquire_is_a_violation() {
        let mut sync = acquired();
        assert!(sync.acquired(2).is_err());
        assert!(sync.is_lost());
    }
}
