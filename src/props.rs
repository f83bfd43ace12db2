//! Range-keyed property storage and the merge engine that writes into it
//!
//! The engine owns this layer outright: annotation passes write through
//! [`Annotations::apply`] under a merge policy, the controller clears and
//! shifts it across edits, and the presentation layer reads it back out.

use std::collections::HashMap;

use crate::face::Face;
use crate::region::Region;

/// How a newly computed value combines with an existing one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverridePolicy {
    /// Write only where the property is absent
    #[default]
    NoOverride,
    /// Unconditionally replace
    Force,
    /// Fill the gaps in a sparsely set range
    Keep,
    /// Push onto the front of the existing value list
    Prepend,
    /// Push onto the back of the existing value list
    Append,
}

/// Property keys the engine writes
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PropKey {
    /// The display face layer
    Face,
    /// Multi-line sensitivity marker
    Multiline,
    /// Auxiliary properties attached by computed face expressions
    Aux(String),
}

/// A property value attached to a range
#[derive(Debug, Clone, PartialEq)]
pub enum PropValue {
    /// A single face
    Face(Face),
    /// A face list built up by prepend/append policies
    Faces(Vec<Face>),
    /// An auxiliary string value
    Text(String),
    /// A bare marker (multi-line marks)
    Flag,
}

/// A property value over a half-open byte range
#[derive(Debug, Clone, PartialEq)]
pub struct PropSpan {
    /// Range covered by the value
    pub region: Region,
    /// The value itself
    pub value: PropValue,
}

/// The annotation layer: per key, sorted non-overlapping value spans
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Annotations {
    spans: HashMap<PropKey, Vec<PropSpan>>,
}

impl Annotations {
    /// Create an empty annotation layer
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply `value` to `region` under `policy`
    ///
    /// An absent value under any policy but `Force` is a no-op: the gap is
    /// preserved rather than set to an explicit empty value. Under `Force`
    /// an absent value clears the range.
    pub fn apply(
        &mut self,
        region: Region,
        key: PropKey,
        value: Option<PropValue>,
        policy: OverridePolicy,
    ) {
        if region.is_empty() {
            return;
        }
        let value = match value {
            Some(v) => v,
            None => {
                if policy == OverridePolicy::Force {
                    self.clear(region, &key);
                }
                return;
            }
        };

        let list = self.spans.entry(key).or_default();
        split_at(list, region.begin);
        split_at(list, region.end);

        match policy {
            OverridePolicy::Force => {
                list.retain(|s| s.region.end <= region.begin || s.region.begin >= region.end);
                list.push(PropSpan { region, value });
            }
            OverridePolicy::NoOverride | OverridePolicy::Keep => {
                let mut additions = gaps_in(list, region, &value);
                list.append(&mut additions);
            }
            OverridePolicy::Prepend | OverridePolicy::Append => {
                let mut additions = gaps_in(list, region, &value);
                for s in list.iter_mut() {
                    if s.region.begin >= region.begin && s.region.end <= region.end {
                        s.value = merged(&s.value, &value, policy);
                    }
                }
                list.append(&mut additions);
            }
        }

        list.sort_by_key(|s| s.region.begin);
        coalesce(list);
    }

    /// Remove `key` over `region`, splitting partially covered spans
    pub fn clear(&mut self, region: Region, key: &PropKey) {
        if region.is_empty() {
            return;
        }
        if let Some(list) = self.spans.get_mut(key) {
            split_at(list, region.begin);
            split_at(list, region.end);
            list.retain(|s| s.region.end <= region.begin || s.region.begin >= region.end);
            if list.is_empty() {
                self.spans.remove(key);
            }
        }
    }

    /// Remove every property over `region`
    pub fn clear_region(&mut self, region: Region) {
        let keys: Vec<PropKey> = self.spans.keys().cloned().collect();
        for key in keys {
            self.clear(region, &key);
        }
    }

    /// Translate every span across an edit that replaced `old_len` bytes at
    /// `begin` with the new content `[begin, end)`
    pub fn shift(&mut self, begin: usize, end: usize, old_len: usize) {
        let new_len = end.saturating_sub(begin);
        let move_pos = |p: usize| -> usize {
            if p <= begin {
                p
            } else if p >= begin + old_len {
                p - old_len + new_len
            } else {
                begin
            }
        };
        for list in self.spans.values_mut() {
            for s in list.iter_mut() {
                s.region = Region::new(move_pos(s.region.begin), move_pos(s.region.end));
            }
            list.retain(|s| !s.region.is_empty());
            coalesce(list);
        }
        self.spans.retain(|_, list| !list.is_empty());
    }

    /// The value of `key` at `pos`, if any
    pub fn get_at(&self, pos: usize, key: &PropKey) -> Option<&PropValue> {
        self.spans
            .get(key)?
            .iter()
            .find(|s| s.region.contains(pos))
            .map(|s| &s.value)
    }

    /// The face value at `pos`, if any
    pub fn face_at(&self, pos: usize) -> Option<&PropValue> {
        self.get_at(pos, &PropKey::Face)
    }

    /// Spans of `key` overlapping `region`, clipped to it
    pub fn spans_in(&self, region: Region, key: &PropKey) -> Vec<PropSpan> {
        let Some(list) = self.spans.get(key) else {
            return Vec::new();
        };
        list.iter()
            .filter(|s| s.region.overlaps(region))
            .map(|s| PropSpan {
                region: Region::new(
                    s.region.begin.max(region.begin),
                    s.region.end.min(region.end),
                ),
                value: s.value.clone(),
            })
            .collect()
    }

    /// Extent of the multi-line mark covering `pos`, if any
    pub fn mark_extent_at(&self, pos: usize) -> Option<Region> {
        self.spans
            .get(&PropKey::Multiline)?
            .iter()
            .find(|s| s.region.contains(pos))
            .map(|s| s.region)
    }

    /// Mark `region` as multi-line-sensitive
    pub fn set_multiline(&mut self, region: Region) {
        self.apply(
            region,
            PropKey::Multiline,
            Some(PropValue::Flag),
            OverridePolicy::Force,
        );
    }

    /// Check whether nothing is annotated at all
    pub fn is_empty(&self) -> bool {
        self.spans.values().all(|l| l.is_empty())
    }
}

/// Split the span straddling `pos`, so no span crosses it afterwards
fn split_at(list: &mut Vec<PropSpan>, pos: usize) {
    if let Some(i) = list
        .iter()
        .position(|s| s.region.begin < pos && pos < s.region.end)
    {
        let tail = PropSpan {
            region: Region::new(pos, list[i].region.end),
            value: list[i].value.clone(),
        };
        list[i].region.end = pos;
        list.insert(i + 1, tail);
    }
}

/// Spans of `value` covering the parts of `region` the list leaves bare
///
/// Requires the list sorted and already split at the region boundaries.
fn gaps_in(list: &[PropSpan], region: Region, value: &PropValue) -> Vec<PropSpan> {
    let mut additions = Vec::new();
    let mut cursor = region.begin;
    for s in list {
        if s.region.end <= region.begin || s.region.begin >= region.end {
            continue;
        }
        if s.region.begin > cursor {
            additions.push(PropSpan {
                region: Region::new(cursor, s.region.begin),
                value: value.clone(),
            });
        }
        cursor = cursor.max(s.region.end);
    }
    if cursor < region.end {
        additions.push(PropSpan {
            region: Region::new(cursor, region.end),
            value: value.clone(),
        });
    }
    additions
}

/// Merge an existing value with a new one under a list policy
fn merged(old: &PropValue, new: &PropValue, policy: OverridePolicy) -> PropValue {
    let (old_faces, new_faces) = match (as_faces(old), as_faces(new)) {
        (Some(o), Some(n)) => (o, n),
        // Non-face values have no list form; the newer value wins
        _ => return new.clone(),
    };
    let mut list = Vec::with_capacity(old_faces.len() + new_faces.len());
    match policy {
        OverridePolicy::Prepend => {
            list.extend(new_faces);
            list.extend(old_faces);
        }
        _ => {
            list.extend(old_faces);
            list.extend(new_faces);
        }
    }
    from_faces(list)
}

fn as_faces(v: &PropValue) -> Option<Vec<Face>> {
    match v {
        PropValue::Face(f) => Some(vec![*f]),
        PropValue::Faces(fs) => Some(fs.clone()),
        _ => None,
    }
}

fn from_faces(mut list: Vec<Face>) -> PropValue {
    // A singleton collapses to scalar storage; not observable through reads
    if list.len() == 1 {
        PropValue::Face(list.remove(0))
    } else {
        PropValue::Faces(list)
    }
}

/// Merge adjacent spans with equal values
fn coalesce(list: &mut Vec<PropSpan>) {
    let mut i = 0;
    while i + 1 < list.len() {
        if list[i].region.end == list[i + 1].region.begin && list[i].value == list[i + 1].value {
            list[i].region.end = list[i + 1].region.end;
            list.remove(i + 1);
        } else {
            i += 1;
        }
    }
}
