//! Shader resource binding layouts, sets, and caching.
//!
//! A [`BindingLayout`] declares which resource slots a pipeline expects; a
//! [`BindingSet`] supplies concrete resources for those slots. Binding sets
//! are immutable once created, so [`BindingCache`] deduplicates them by
//! content: per-frame code can describe its bindings every iteration and
//! only pay creation cost the first time a particular combination appears.

use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::device::GraphicsDevice;
use crate::error::{GraphicsError, GraphicsResult};
use crate::resources::{Sampler, Texture};
use crate::types::TextureUsage;

/// Shader stages that can observe a binding layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderVisibility {
    /// Visible to the vertex stage.
    Vertex,
    /// Visible to the pixel stage.
    Pixel,
    /// Visible to the compute stage.
    Compute,
}

/// A single slot declaration in a binding layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BindingLayoutItem {
    /// A sampled texture (shader resource view).
    Texture {
        /// Register slot.
        slot: u32,
    },
    /// A writable storage texture (unordered access view).
    StorageTexture {
        /// Register slot.
        slot: u32,
    },
    /// A texture sampler.
    Sampler {
        /// Register slot.
        slot: u32,
    },
    /// Inline constant data, set per command list via
    /// [`CommandList::set_push_constants`](crate::CommandList::set_push_constants).
    PushConstants {
        /// Register slot.
        slot: u32,
        /// Size of the constant data in bytes.
        size: u32,
    },
}

/// Descriptor for creating a [`BindingLayout`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BindingLayoutDesc {
    /// Debug label.
    pub label: Option<String>,
    /// Which shader stage observes these bindings.
    pub visibility: ShaderVisibility,
    /// Declared slots.
    pub items: Vec<BindingLayoutItem>,
}

impl BindingLayoutDesc {
    /// Create an empty layout descriptor for the given stage.
    pub fn new(visibility: ShaderVisibility) -> Self {
        Self {
            label: None,
            visibility,
            items: Vec::new(),
        }
    }

    /// Set the debug label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Declare a sampled texture slot.
    pub fn add_texture(mut self, slot: u32) -> Self {
        self.items.push(BindingLayoutItem::Texture { slot });
        self
    }

    /// Declare a writable storage texture slot.
    pub fn add_storage_texture(mut self, slot: u32) -> Self {
        self.items.push(BindingLayoutItem::StorageTexture { slot });
        self
    }

    /// Declare a sampler slot.
    pub fn add_sampler(mut self, slot: u32) -> Self {
        self.items.push(BindingLayoutItem::Sampler { slot });
        self
    }

    /// Declare a push-constants slot of `size` bytes.
    pub fn add_push_constants(mut self, slot: u32, size: u32) -> Self {
        self.items.push(BindingLayoutItem::PushConstants { slot, size });
        self
    }
}

/// Declares the resource slots a pipeline expects.
///
/// Created by [`GraphicsDevice::create_binding_layout`].
pub struct BindingLayout {
    device: Arc<GraphicsDevice>,
    desc: BindingLayoutDesc,
}

impl BindingLayout {
    pub(crate) fn new(device: Arc<GraphicsDevice>, desc: BindingLayoutDesc) -> Self {
        Self { device, desc }
    }

    /// Get the parent device.
    pub fn device(&self) -> &Arc<GraphicsDevice> {
        &self.device
    }

    /// Get the layout descriptor.
    pub fn desc(&self) -> &BindingLayoutDesc {
        &self.desc
    }

    /// Size of the declared push-constants block, if any.
    pub fn push_constants_size(&self) -> Option<u32> {
        self.desc.items.iter().find_map(|item| match item {
            BindingLayoutItem::PushConstants { size, .. } => Some(*size),
            _ => None,
        })
    }
}

impl std::fmt::Debug for BindingLayout {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BindingLayout")
            .field("label", &self.desc.label)
            .field("visibility", &self.desc.visibility)
            .field("items", &self.desc.items)
            .finish()
    }
}

/// A single bound resource in a [`BindingSetDesc`].
#[derive(Debug, Clone)]
pub enum BindingSetItem {
    /// A sampled texture.
    Texture {
        /// Register slot.
        slot: u32,
        /// Bound texture.
        texture: Arc<Texture>,
    },
    /// A writable storage texture.
    StorageTexture {
        /// Register slot.
        slot: u32,
        /// Bound texture.
        texture: Arc<Texture>,
    },
    /// A sampler.
    Sampler {
        /// Register slot.
        slot: u32,
        /// Bound sampler.
        sampler: Arc<Sampler>,
    },
}

/// Descriptor for creating a [`BindingSet`].
#[derive(Debug, Clone, Default)]
pub struct BindingSetDesc {
    /// Bound resources.
    pub items: Vec<BindingSetItem>,
}

impl BindingSetDesc {
    /// Create an empty binding set descriptor.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a sampled texture.
    pub fn with_texture(mut self, slot: u32, texture: Arc<Texture>) -> Self {
        self.items.push(BindingSetItem::Texture { slot, texture });
        self
    }

    /// Bind a writable storage texture.
    pub fn with_storage_texture(mut self, slot: u32, texture: Arc<Texture>) -> Self {
        self.items
            .push(BindingSetItem::StorageTexture { slot, texture });
        self
    }

    /// Bind a sampler.
    pub fn with_sampler(mut self, slot: u32, sampler: Arc<Sampler>) -> Self {
        self.items.push(BindingSetItem::Sampler { slot, sampler });
        self
    }

    /// Content hash used as the cache key in [`BindingCache`].
    fn cache_key(&self) -> u64 {
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        for item in &self.items {
            match item {
                BindingSetItem::Texture { slot, texture } => {
                    0u8.hash(&mut hasher);
                    slot.hash(&mut hasher);
                    texture.id().hash(&mut hasher);
                }
                BindingSetItem::StorageTexture { slot, texture } => {
                    1u8.hash(&mut hasher);
                    slot.hash(&mut hasher);
                    texture.id().hash(&mut hasher);
                }
                BindingSetItem::Sampler { slot, sampler } => {
                    2u8.hash(&mut hasher);
                    slot.hash(&mut hasher);
                    (Arc::as_ptr(sampler) as usize).hash(&mut hasher);
                }
            }
        }
        hasher.finish()
    }
}

/// Concrete resources bound to the slots of a [`BindingLayout`].
///
/// Created by [`GraphicsDevice::create_binding_set`], which validates the
/// set against its layout. Immutable once created.
pub struct BindingSet {
    layout: Arc<BindingLayout>,
    desc: BindingSetDesc,
}

impl BindingSet {
    pub(crate) fn new(layout: Arc<BindingLayout>, desc: BindingSetDesc) -> Self {
        Self { layout, desc }
    }

    /// Get the layout this set was created against.
    pub fn layout(&self) -> &Arc<BindingLayout> {
        &self.layout
    }

    /// Get the set descriptor.
    pub fn desc(&self) -> &BindingSetDesc {
        &self.desc
    }

    /// All textures referenced by this set, for submission tracking.
    pub(crate) fn textures(&self) -> impl Iterator<Item = &Arc<Texture>> {
        self.desc.items.iter().filter_map(|item| match item {
            BindingSetItem::Texture { texture, .. }
            | BindingSetItem::StorageTexture { texture, .. } => Some(texture),
            BindingSetItem::Sampler { .. } => None,
        })
    }
}

impl std::fmt::Debug for BindingSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BindingSet")
            .field("layout", &self.layout.desc().label)
            .field("items", &self.desc.items.len())
            .finish()
    }
}

/// Validate a binding set descriptor against a layout.
///
/// Every non-push-constants layout slot must be filled by an item of the
/// matching kind, textures must carry the usage the slot requires, and the
/// set must not bind slots the layout does not declare.
pub(crate) fn validate_binding_set(
    desc: &BindingSetDesc,
    layout: &BindingLayout,
) -> GraphicsResult<()> {
    let layout_items = &layout.desc().items;

    for item in &desc.items {
        let matched = match item {
            BindingSetItem::Texture { slot, texture } => {
                if !texture.usage().contains(TextureUsage::TEXTURE_BINDING) {
                    return Err(GraphicsError::InvalidParameter(format!(
                        "texture {:?} bound as sampled at slot {slot} lacks TEXTURE_BINDING usage",
                        texture.label()
                    )));
                }
                layout_items
                    .iter()
                    .any(|l| matches!(l, BindingLayoutItem::Texture { slot: s } if s == slot))
            }
            BindingSetItem::StorageTexture { slot, texture } => {
                if !texture.usage().contains(TextureUsage::STORAGE_BINDING) {
                    return Err(GraphicsError::InvalidParameter(format!(
                        "texture {:?} bound as storage at slot {slot} lacks STORAGE_BINDING usage",
                        texture.label()
                    )));
                }
                layout_items
                    .iter()
                    .any(|l| matches!(l, BindingLayoutItem::StorageTexture { slot: s } if s == slot))
            }
            BindingSetItem::Sampler { slot, .. } => layout_items
                .iter()
                .any(|l| matches!(l, BindingLayoutItem::Sampler { slot: s } if s == slot)),
        };
        if !matched {
            return Err(GraphicsError::InvalidParameter(
                "binding set item has no matching slot in the layout".to_string(),
            ));
        }
    }

    let bound = desc.items.len();
    let expected = layout_items
        .iter()
        .filter(|l| !matches!(l, BindingLayoutItem::PushConstants { .. }))
        .count();
    if bound != expected {
        return Err(GraphicsError::InvalidParameter(format!(
            "binding set fills {bound} slots, layout declares {expected}"
        )));
    }

    Ok(())
}

/// Content-addressed cache of [`BindingSet`]s.
///
/// Per-frame code describes its bindings every iteration; the cache returns
/// the existing set when the same combination of resources was seen before.
/// Each loop (render, compute worker) owns its own cache.
pub struct BindingCache {
    device: Arc<GraphicsDevice>,
    sets: Mutex<HashMap<u64, Arc<BindingSet>>>,
}

impl BindingCache {
    /// Create an empty cache for the given device.
    pub fn new(device: Arc<GraphicsDevice>) -> Self {
        Self {
            device,
            sets: Mutex::new(HashMap::new()),
        }
    }

    /// Look up a binding set by content, creating it on first use.
    pub fn get_or_create(
        &self,
        desc: &BindingSetDesc,
        layout: &Arc<BindingLayout>,
    ) -> GraphicsResult<Arc<BindingSet>> {
        let key = desc.cache_key();

        if let Some(set) = self.sets.lock().get(&key) {
            return Ok(set.clone());
        }

        let set = self.device.create_binding_set(desc.clone(), layout.clone())?;
        self.sets.lock().insert(key, set.clone());
        Ok(set)
    }

    /// Number of cached binding sets.
    pub fn len(&self) -> usize {
        self.sets.lock().len()
    }

    /// Returns true if nothing has been cached yet.
    pub fn is_empty(&self) -> bool {
        self.sets.lock().is_empty()
    }

    /// Drop all cached sets.
    pub fn clear(&self) {
        self.sets.lock().clear();
    }
}

static_assertions::assert_impl_all!(BindingCache: Send, Sync);
static_assertions::assert_impl_all!(BindingSet: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instance::GraphicsInstance;
    use crate::types::{SamplerDescriptor, TextureDescriptor, TextureFormat};

    fn create_test_device() -> Arc<GraphicsDevice> {
        let instance = GraphicsInstance::new().unwrap();
        instance.create_device().unwrap()
    }

    fn make_texture(device: &Arc<GraphicsDevice>, usage: TextureUsage) -> Arc<Texture> {
        device
            .create_texture(&TextureDescriptor::new_2d(
                16,
                16,
                TextureFormat::Rgba8Unorm,
                usage,
            ))
            .unwrap()
    }

    #[test]
    fn test_layout_push_constants_size() {
        let device = create_test_device();
        let layout = device
            .create_binding_layout(
                &BindingLayoutDesc::new(ShaderVisibility::Compute)
                    .add_push_constants(0, 4)
                    .add_storage_texture(0),
            )
            .unwrap();
        assert_eq!(layout.push_constants_size(), Some(4));
    }

    #[test]
    fn test_binding_set_validation() {
        let device = create_test_device();
        let layout = device
            .create_binding_layout(
                &BindingLayoutDesc::new(ShaderVisibility::Pixel)
                    .add_texture(0)
                    .add_sampler(0),
            )
            .unwrap();
        let texture = make_texture(&device, TextureUsage::TEXTURE_BINDING);
        let sampler = device.create_sampler(&SamplerDescriptor::linear()).unwrap();

        let set = device.create_binding_set(
            BindingSetDesc::new()
                .with_texture(0, texture.clone())
                .with_sampler(0, sampler),
            layout.clone(),
        );
        assert!(set.is_ok());

        // Missing sampler slot.
        let incomplete =
            device.create_binding_set(BindingSetDesc::new().with_texture(0, texture), layout);
        assert!(matches!(
            incomplete,
            Err(GraphicsError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_binding_set_usage_check() {
        let device = create_test_device();
        let layout = device
            .create_binding_layout(
                &BindingLayoutDesc::new(ShaderVisibility::Compute).add_storage_texture(0),
            )
            .unwrap();
        // Sampled-only texture cannot be bound as storage.
        let texture = make_texture(&device, TextureUsage::TEXTURE_BINDING);

        let result = device
            .create_binding_set(BindingSetDesc::new().with_storage_texture(0, texture), layout);
        assert!(matches!(result, Err(GraphicsError::InvalidParameter(_))));
    }

    #[test]
    fn test_cache_deduplicates_by_content() {
        let device = create_test_device();
        let layout = device
            .create_binding_layout(
                &BindingLayoutDesc::new(ShaderVisibility::Compute).add_storage_texture(0),
            )
            .unwrap();
        let texture = make_texture(
            &device,
            TextureUsage::STORAGE_BINDING | TextureUsage::TEXTURE_BINDING,
        );
        let cache = BindingCache::new(device.clone());

        let desc = BindingSetDesc::new().with_storage_texture(0, texture.clone());
        let a = cache.get_or_create(&desc, &layout).unwrap();
        let b = cache.get_or_create(&desc, &layout).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(cache.len(), 1);

        // A different texture yields a different set.
        let other = make_texture(&device, TextureUsage::STORAGE_BINDING);
        let c = cache
            .get_or_create(&BindingSetDesc::new().with_storage_texture(0, other), &layout)
            .unwrap();
        assert!(!Arc::ptr_eq(&a, &c));
        assert_eq!(cache.len(), 2);
    }
}
