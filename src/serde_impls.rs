use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use core::fmt::{self, Formatter};
use core::hash::BuildHasher;
use core::marker::PhantomData;

use crate::case_fold::KeyEquivalence;
use crate::map::StableHashMap;

// Upper bound on entries reserved up front from an untrusted size hint.
const MAX_PREALLOC: usize = 4096;

// Serialized in insertion order.
impl<K, V, E, S> Serialize for StableHashMap<K, V, E, S>
where
    K: Serialize,
    V: Serialize,
{
    fn serialize<Sr>(&self, serializer: Sr) -> Result<Sr::Ok, Sr::Error>
    where
        Sr: Serializer,
    {
        serializer.collect_map(self.iter().map(|(_, k, v)| (k, v)))
    }
}

// Later keys equivalent to earlier ones overwrite their values, as with
// `insert_or_assign`.
impl<'de, K, V, E, S> Deserialize<'de> for StableHashMap<K, V, E, S>
where
    K: Deserialize<'de> + AsRef<[u8]>,
    V: Deserialize<'de>,
    E: KeyEquivalence + Default,
    S: BuildHasher + Default,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_map(MapVisitor {
            _marker: PhantomData,
        })
    }
}

struct MapVisitor<K, V, E, S> {
    _marker: PhantomData<StableHashMap<K, V, E, S>>,
}

impl<'de, K, V, E, S> Visitor<'de> for MapVisitor<K, V, E, S>
where
    K: Deserialize<'de> + AsRef<[u8]>,
    V: Deserialize<'de>,
    E: KeyEquivalence + Default,
    S: BuildHasher + Default,
{
    type Value = StableHashMap<K, V, E, S>;

    fn expecting(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "a map")
    }

    fn visit_map<M>(self, mut access: M) -> Result<Self::Value, M::Error>
    where
        M: MapAccess<'de>,
    {
        let mut values = match access.size_hint() {
            Some(size) => {
                StableHashMap::with_capacity_and_hasher(size.min(MAX_PREALLOC), S::default())
            }
            None => StableHashMap::default(),
        };

        while let Some((key, value)) = access.next_entry()? {
            values.insert_or_assign(key, value);
        }

        Ok(values)
    }
}
