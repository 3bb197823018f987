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

//! Offscreen framebuffers: ordered color attachments plus at most one
//! depth/stencil attachment.

use crate::math::Extent2D;
use crate::renderer::api::common::ResourceId;
use crate::renderer::api::format::PixelFormat;
use crate::renderer::api::native::FramebufferNative;
use crate::renderer::api::texture::{Texture, TextureUsage};
use crate::renderer::error::RenderError;

/// Maximum number of color attachments of one framebuffer.
pub const MAX_COLOR_ATTACHMENTS: usize = 8;

/// One texture subresource to render into. Depth formats become the
/// depth/stencil attachment, every other format a color attachment.
#[derive(Debug, Clone, Copy)]
pub struct FramebufferAttachment<'a> {
    /// The target texture.
    pub texture: &'a Texture,
    /// The mip level rendered into.
    pub mip_level: u32,
    /// The array layer (cube faces count individually).
    pub array_layer: u32,
}

impl<'a> FramebufferAttachment<'a> {
    /// Attaches mip 0, layer 0 of `texture`.
    pub fn new(texture: &'a Texture) -> Self {
        Self {
            texture,
            mip_level: 0,
            array_layer: 0,
        }
    }
}

/// What a framebuffer remembers about one attachment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AttachmentInfo {
    /// The attached texture.
    pub texture: ResourceId,
    /// Its format.
    pub format: PixelFormat,
    /// The attached mip level.
    pub mip_level: u32,
    /// The attached array layer.
    pub array_layer: u32,
}

/// The validated attachment set of a framebuffer about to be created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FramebufferLayout {
    /// Color attachments in order.
    pub colors: Vec<AttachmentInfo>,
    /// The depth/stencil attachment, if any.
    pub depth_stencil: Option<AttachmentInfo>,
    /// The shared size of every attachment.
    pub extent: Extent2D,
}

impl FramebufferLayout {
    /// Sorts and validates attachments. Nothing native is touched.
    pub fn plan(attachments: &[FramebufferAttachment<'_>]) -> Result<Self, RenderError> {
        if attachments.is_empty() {
            return Err(RenderError::config("a framebuffer needs at least one attachment"));
        }

        let mut colors = Vec::new();
        let mut depth_stencil = None;
        let mut extent: Option<Extent2D> = None;

        for (index, attachment) in attachments.iter().enumerate() {
            let texture = attachment.texture;
            if !texture.is_alive() {
                return Err(RenderError::config(format!(
                    "attachment {index} refers to a disposed texture"
                )));
            }
            let desc = texture.desc();
            if attachment.mip_level >= desc.mip_levels
                || attachment.array_layer >= desc.layer_count()
            {
                return Err(RenderError::config(format!(
                    "attachment {index} selects mip {} layer {} outside the texture",
                    attachment.mip_level, attachment.array_layer
                )));
            }

            let size = desc.extent().mip_level_size(attachment.mip_level).to_2d();
            match extent {
                Some(expected) if expected != size => {
                    return Err(RenderError::config(format!(
                        "attachment {index} is {}x{} but previous attachments are {}x{}",
                        size.width, size.height, expected.width, expected.height
                    )));
                }
                _ => extent = Some(size),
            }

            let info = AttachmentInfo {
                texture: texture.id(),
                format: desc.format,
                mip_level: attachment.mip_level,
                array_layer: attachment.array_layer,
            };

            if desc.format.is_depth() {
                if depth_stencil.is_some() {
                    return Err(RenderError::config(
                        "a framebuffer can have at most one depth/stencil attachment",
                    ));
                }
                if !desc.usage.contains(TextureUsage::DEPTH_STENCIL) {
                    return Err(RenderError::config(format!(
                        "attachment {index} was not created with DEPTH_STENCIL usage"
                    )));
                }
                depth_stencil = Some(info);
            } else {
                if !desc.usage.contains(TextureUsage::RENDER_TARGET) {
                    return Err(RenderError::config(format!(
                        "attachment {index} was not created with RENDER_TARGET usage"
                    )));
                }
                colors.push(info);
            }
        }

        if colors.len() > MAX_COLOR_ATTACHMENTS {
            return Err(RenderError::config(format!(
                "{} color attachments exceed the limit of {MAX_COLOR_ATTACHMENTS}",
                colors.len()
            )));
        }

        Ok(Self {
            colors,
            depth_stencil,
            extent: extent.unwrap_or_default(),
        })
    }
}

/// A set of render targets. Owned by the caller.
#[derive(Debug)]
pub struct Framebuffer {
    id: ResourceId,
    layout: FramebufferLayout,
    native: Option<FramebufferNative>,
}

impl Framebuffer {
    /// Wraps a created native framebuffer.
    pub fn new(id: ResourceId, layout: FramebufferLayout, native: FramebufferNative) -> Self {
        Self {
            id,
            layout,
            native: Some(native),
        }
    }

    /// The device-unique identity.
    pub fn id(&self) -> ResourceId {
        self.id
    }

    /// The attachments.
    pub fn layout(&self) -> &FramebufferLayout {
        &self.layout
    }

    /// The shared size of the attachments.
    pub fn extent(&self) -> Extent2D {
        self.layout.extent
    }

    /// The native objects, or `None` once disposed.
    pub fn native(&self) -> Option<&FramebufferNative> {
        self.native.as_ref()
    }

    /// Takes the native objects out, leaving the framebuffer disposed.
    pub fn take_native(&mut self) -> Option<FramebufferNative> {
        self.native.take()
    }

    /// Returns `true` until the framebuffer is disposed.
    pub fn is_alive(&self) -> bool {
        self.native.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::api::native::{NativeHandle, TextureNative};
    use crate::renderer::api::texture::TextureDescriptor;

    fn texture(id: u64, format: PixelFormat, usage: TextureUsage, size: u32) -> Texture {
        let desc = TextureDescriptor {
            usage,
            ..TextureDescriptor::new_2d(size, size, format)
        };
        Texture::new(
            ResourceId(id),
            desc,
            TextureNative {
                storage: NativeHandle::Gl(id as u32),
                shader_view: None,
                memory: None,
            },
        )
    }

    #[test]
    fn color_and_depth_are_sorted_by_format() {
        let color = texture(1, PixelFormat::R8G8B8A8Unorm, TextureUsage::RENDER_TARGET, 64);
        let depth = texture(2, PixelFormat::D32Float, TextureUsage::DEPTH_STENCIL, 64);
        let layout = FramebufferLayout::plan(&[
            FramebufferAttachment::new(&depth),
            FramebufferAttachment::new(&color),
        ])
        .unwrap();
        assert_eq!(layout.colors.len(), 1);
        assert_eq!(layout.depth_stencil.map(|d| d.texture), Some(ResourceId(2)));
        assert_eq!(layout.extent, Extent2D::new(64, 64));
    }

    #[test]
    fn second_depth_attachment_is_rejected() {
        let a = texture(1, PixelFormat::D24UnormS8Uint, TextureUsage::DEPTH_STENCIL, 32);
        let b = texture(2, PixelFormat::D32Float, TextureUsage::DEPTH_STENCIL, 32);
        let err = FramebufferLayout::plan(&[
            FramebufferAttachment::new(&a),
            FramebufferAttachment::new(&b),
        ])
        .unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn mismatched_sizes_are_rejected() {
        let a = texture(1, PixelFormat::R8G8B8A8Unorm, TextureUsage::RENDER_TARGET, 32);
        let b = texture(2, PixelFormat::R8G8B8A8Unorm, TextureUsage::RENDER_TARGET, 64);
        assert!(FramebufferLayout::plan(&[
            FramebufferAttachment::new(&a),
            FramebufferAttachment::new(&b),
        ])
        .is_err());
    }

    #[test]
    fn sampled_only_texture_cannot_be_a_target() {
        let a = texture(1, PixelFormat::R8G8B8A8Unorm, TextureUsage::SAMPLED, 32);
        assert!(FramebufferLayout::plan(&[FramebufferAttachment::new(&a)]).is_err());
    }
}
