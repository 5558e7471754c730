//! Immutable key → provider tables.
//!
//! A composition root hands [`ServiceRegistry::build`] the full list of
//! [`ProviderDescriptor`]s at startup. The registry never discovers providers on
//! its own. Once built the table is frozen: there is no insertion API, and
//! lookups take `&self` only, so any number of threads may resolve concurrently.

use std::borrow::Cow;
use std::collections::hash_map::{Entry, HashMap};
use std::fmt;
use std::hash::Hash;

use crate::error::{BuildWarning, DispatchError};

/// A provider paired with the key it serves.
///
/// The key is optional because providers report it themselves; a provider that
/// reports none is skipped during [`ServiceRegistry::build`].
#[derive(Debug, Clone)]
pub struct ProviderDescriptor<K, V> {
   key: Option<K>,
   name: Cow<'static, str>,
   provider: V,
}

impl<K, V> ProviderDescriptor<K, V> {
   /// `name` identifies the provider in diagnostics.
   pub fn new(key: Option<K>, name: impl Into<Cow<'static, str>>, provider: V) -> Self {
      Self {
         key,
         name: name.into(),
         provider,
      }
   }

   pub fn keyed(key: K, name: impl Into<Cow<'static, str>>, provider: V) -> Self {
      Self::new(Some(key), name, provider)
   }

   pub fn key(&self) -> Option<&K> {
      self.key.as_ref()
   }

   pub fn name(&self) -> &str {
      &self.name
   }

   pub fn provider(&self) -> &V {
      &self.provider
   }
}

#[derive(Debug, Clone)]
struct Registered<V> {
   name: Cow<'static, str>,
   provider: V,
}

/// A frozen table resolving keys to providers.
#[derive(Debug, Clone)]
pub struct ServiceRegistry<K, V> {
   table: HashMap<K, Registered<V>>,
   warnings: Vec<BuildWarning>,
}

impl<K, V> ServiceRegistry<K, V>
where
   K: Eq + Hash + fmt::Display,
{
   /// Builds the table from `descriptors`, in order.
   ///
   /// Descriptors without a key are skipped. When two descriptors share a key the
   /// later one replaces the earlier. Both cases are recorded as warnings and
   /// logged; neither fails the build.
   pub fn build<I>(descriptors: I) -> Self
   where
      I: IntoIterator<Item = ProviderDescriptor<K, V>>,
   {
      let mut table = HashMap::new();
      let mut warnings = Vec::new();
      let mut seen = 0usize;

      for descriptor in descriptors {
         seen += 1;
         let ProviderDescriptor {
            key,
            name,
            provider,
         } = descriptor;

         let Some(key) = key else {
            tracing::warn!(provider = %name, "provider reports no key, skipping");
            warnings.push(BuildWarning::MissingKey {
               provider: name.into_owned(),
            });
            continue;
         };

         tracing::info!(provider = %name, %key, "registering provider");
         let registered = Registered { name, provider };
         match table.entry(key) {
            Entry::Vacant(slot) => {
               slot.insert(registered);
            }
            Entry::Occupied(mut slot) => {
               let warning = BuildWarning::DuplicateKey {
                  key: slot.key().to_string(),
                  replaced: slot.get().name.to_string(),
                  replacement: registered.name.to_string(),
               };
               tracing::warn!(%warning, "duplicate provider key");
               warnings.push(warning);
               slot.insert(registered);
            }
         }
      }

      if seen == 0 {
         tracing::warn!("service registry built without providers");
         warnings.push(BuildWarning::NoProviders);
      }

      Self { table, warnings }
   }

   /// Resolves `key` to its provider.
   pub fn resolve(&self, key: &K) -> Result<V, DispatchError>
   where
      V: Clone,
   {
      self
         .get(key)
         .cloned()
         .ok_or_else(|| DispatchError::NotFound(key.to_string()))
   }

   #[inline]
   pub fn get(&self, key: &K) -> Option<&V> {
      self.table.get(key).map(|registered| &registered.provider)
   }

   /// Name of the provider that won `key`.
   pub fn provider_name(&self, key: &K) -> Option<&str> {
      self.table.get(key).map(|registered| registered.name.as_ref())
   }

   #[inline]
   pub fn contains(&self, key: &K) -> bool {
      self.table.contains_key(key)
   }
}

impl<K, V> ServiceRegistry<K, V> {
   #[inline]
   pub fn len(&self) -> usize {
      self.table.len()
   }

   #[inline]
   pub fn is_empty(&self) -> bool {
      self.table.is_empty()
   }

   /// Registered keys, in no particular order.
   pub fn keys(&self) -> impl Iterator<Item = &K> {
      self.table.keys()
   }

   /// Diagnostics recorded during [`build`](Self::build), in descriptor order.
   pub fn warnings(&self) -> &[BuildWarning] {
      &self.warnings
   }
}
