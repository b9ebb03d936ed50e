//! Channel-multiplier table
//!
//! Maps ink names to the [`ChannelMultipliers`] quadruple describing how
//! one unit of that ink contributes to the canonical CMYK accumulation.
//! Names are case-insensitive and may carry aliases; names and aliases
//! share one global namespace, and a collision rejects the entry at load
//! time rather than crashing later.
//!
//! The four process channels "c", "m", "y", "k" are reserved and always
//! present with identity multipliers, whether or not an external
//! configuration defines them.

use crate::error::ConfigError;
use crate::ink::ChannelMultipliers;
use rustc_hash::FxHashMap;

/// One external configuration entry, as produced by the (out-of-scope)
/// on-disk color-name loader
#[derive(Debug, Clone)]
pub struct ChannelEntry {
  pub name: String,
  pub multipliers: ChannelMultipliers,
  pub aliases: Vec<String>,
}

#[derive(Debug, Clone)]
struct ChannelDef {
  name: String,
  multipliers: ChannelMultipliers,
}

/// Registry of known ink channels
///
/// # Examples
///
/// ```
/// use sepview::channels::ChannelTable;
/// use sepview::ink::ChannelMultipliers;
///
/// let mut table = ChannelTable::with_defaults();
/// table
///     .register("orange", ChannelMultipliers::new(0.0, 0.6, 1.0, 0.0), &["o"])
///     .unwrap();
///
/// assert_eq!(table.resolve("C"), Some(ChannelMultipliers::CYAN));
/// assert_eq!(table.resolve("o"), table.resolve("Orange"));
/// assert_eq!(table.resolve("unknown"), None);
/// ```
#[derive(Debug, Clone, Default)]
pub struct ChannelTable {
  channels: Vec<ChannelDef>,
  // Lowercased name or alias -> index into `channels`.
  index: FxHashMap<String, usize>,
}

impl ChannelTable {
  /// Creates an empty table with no channels at all
  ///
  /// Most callers want [`ChannelTable::with_defaults`] instead.
  pub fn new() -> Self {
    Self::default()
  }

  /// Creates a table pre-populated with the reserved process channels
  pub fn with_defaults() -> Self {
    let mut table = Self::new();
    for (name, multipliers) in [
      ("c", ChannelMultipliers::CYAN),
      ("m", ChannelMultipliers::MAGENTA),
      ("y", ChannelMultipliers::YELLOW),
      ("k", ChannelMultipliers::KEY),
    ] {
      // The table is empty, so these cannot collide.
      table
        .register(name, multipliers, &[])
        .unwrap_or_else(|_| unreachable!("reserved channel {name} collided in empty table"));
    }
    table
  }

  /// Registers a channel under a name and optional aliases
  ///
  /// The name and every alias must be unused, case-insensitively, across
  /// the whole table; otherwise the entry is rejected with
  /// [`ConfigError::DuplicateChannel`] and the table is left unchanged.
  /// Non-finite multiplier components are rejected with
  /// [`ConfigError::InvalidMultiplier`].
  pub fn register(
    &mut self,
    name: &str,
    multipliers: ChannelMultipliers,
    aliases: &[&str],
  ) -> Result<(), ConfigError> {
    for (component, value) in [
      ("cyan", multipliers.c),
      ("magenta", multipliers.m),
      ("yellow", multipliers.y),
      ("key", multipliers.k),
    ] {
      if !value.is_finite() {
        return Err(ConfigError::InvalidMultiplier {
          name: name.to_string(),
          component,
        });
      }
    }

    let mut keys = Vec::with_capacity(1 + aliases.len());
    keys.push(name.to_lowercase());
    for alias in aliases {
      keys.push(alias.to_lowercase());
    }
    for (i, key) in keys.iter().enumerate() {
      if self.index.contains_key(key) || keys[..i].contains(key) {
        return Err(ConfigError::DuplicateChannel { name: key.clone() });
      }
    }

    let idx = self.channels.len();
    self.channels.push(ChannelDef {
      name: name.to_string(),
      multipliers,
    });
    for key in keys {
      self.index.insert(key, idx);
    }
    Ok(())
  }

  /// Loads external entries, skipping invalid ones
  ///
  /// Each rejected entry is reported through `log::warn!` and skipped;
  /// loading always continues. Returns the number of entries actually
  /// registered.
  pub fn load(&mut self, entries: impl IntoIterator<Item = ChannelEntry>) -> usize {
    let mut loaded = 0;
    for entry in entries {
      let aliases: Vec<&str> = entry.aliases.iter().map(String::as_str).collect();
      match self.register(&entry.name, entry.multipliers, &aliases) {
        Ok(()) => loaded += 1,
        Err(err) => log::warn!("skipping channel entry {:?}: {err}", entry.name),
      }
    }
    loaded
  }

  /// Looks up a channel's multipliers by name or alias, case-insensitively
  pub fn resolve(&self, name: &str) -> Option<ChannelMultipliers> {
    self
      .index
      .get(&name.to_lowercase())
      .map(|&idx| self.channels[idx].multipliers)
  }

  /// The canonical (registration-time) name behind a name or alias
  pub fn canonical_name(&self, name: &str) -> Option<&str> {
    self
      .index
      .get(&name.to_lowercase())
      .map(|&idx| self.channels[idx].name.as_str())
  }

  /// Number of registered channels (aliases do not count)
  pub fn len(&self) -> usize {
    self.channels.len()
  }

  pub fn is_empty(&self) -> bool {
    self.channels.is_empty()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn defaults_always_present() {
    let table = ChannelTable::with_defaults();
    assert_eq!(table.len(), 4);
    assert_eq!(table.resolve("c"), Some(ChannelMultipliers::CYAN));
    assert_eq!(table.resolve("K"), Some(ChannelMultipliers::KEY));
  }

  #[test]
  fn duplicate_name_is_rejected_case_insensitively() {
    let mut table = ChannelTable::with_defaults();
    let err = table
      .register("C", ChannelMultipliers::new(0.5, 0.0, 0.0, 0.0), &[])
      .unwrap_err();
    assert_eq!(
      err,
      ConfigError::DuplicateChannel {
        name: "c".to_string()
      }
    );
    // The reserved channel is untouched.
    assert_eq!(table.resolve("c"), Some(ChannelMultipliers::CYAN));
  }

  #[test]
  fn alias_collisions_are_rejected() {
    let mut table = ChannelTable::with_defaults();
    table
      .register("varnish", ChannelMultipliers::new(0.0, 0.0, 0.0, 0.0), &["v"])
      .unwrap();

    // Alias colliding with an existing alias.
    assert!(table
      .register("violet", ChannelMultipliers::new(0.3, 0.8, 0.0, 0.0), &["V"])
      .is_err());

    // Alias colliding with an existing name.
    assert!(table
      .register("vivid", ChannelMultipliers::new(0.3, 0.8, 0.0, 0.0), &["varnish"])
      .is_err());

    // Entry whose own keys collide with each other.
    assert!(table
      .register("neon", ChannelMultipliers::new(0.1, 0.1, 0.1, 0.0), &["neon"])
      .is_err());
  }

  #[test]
  fn non_finite_multiplier_is_rejected() {
    let mut table = ChannelTable::with_defaults();
    let err = table
      .register("bad", ChannelMultipliers::new(f32::NAN, 0.0, 0.0, 0.0), &[])
      .unwrap_err();
    assert!(matches!(err, ConfigError::InvalidMultiplier { component: "cyan", .. }));
    assert_eq!(table.resolve("bad"), None);
  }

  #[test]
  fn load_skips_bad_entries_and_continues() {
    let mut table = ChannelTable::with_defaults();
    let loaded = table.load(vec![
      ChannelEntry {
        name: "orange".to_string(),
        multipliers: ChannelMultipliers::new(0.0, 0.6, 1.0, 0.0),
        aliases: vec!["o".to_string()],
      },
      ChannelEntry {
        // Duplicate of the reserved key channel; skipped.
        name: "K".to_string(),
        multipliers: ChannelMultipliers::KEY,
        aliases: vec![],
      },
      ChannelEntry {
        name: "green".to_string(),
        multipliers: ChannelMultipliers::new(1.0, 0.0, 1.0, 0.0),
        aliases: vec![],
      },
    ]);
    assert_eq!(loaded, 2);
    assert!(table.resolve("o").is_some());
    assert!(table.resolve("green").is_some());
  }

  #[test]
  fn canonical_name_follows_aliases() {
    let mut table = ChannelTable::with_defaults();
    table
      .register("Pantone 301", ChannelMultipliers::new(1.0, 0.4, 0.0, 0.1), &["p301"])
      .unwrap();
    assert_eq!(table.canonical_name("P301"), Some("Pantone 301"));
    assert_eq!(table.canonical_name("pantone 301"), Some("Pantone 301"));
  }
}
