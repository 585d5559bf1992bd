//! Serialization of arbitrary runtime values into portable descriptors.
//!
//! A described value is a `(descriptor, heap)` pair. Primitives serialize
//! in place; compound values live in an ordered heap indexed by descriptors.
//! A writer map keyed on object identity guarantees each object is described
//! at most once, so cycles terminate and shared substructure stays shared.
//!
//! [`undescribe`] inverts the encoding into an opaque revived graph:
//! functions come back as inert function markers, promise-shaped values as
//! never-settling placeholders, arrays with their length, and class
//! instances tagged with their constructor name. Revived nodes are memoized
//! by heap index so sharing and cycles survive the round trip.

use std::{cell::RefCell, rc::Rc};

use ahash::AHashMap;
use serde::{Deserialize, Serialize};

use crate::value::{ObjectKind, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrimitiveKind {
    String,
    Number,
    Boolean,
    Null,
    Undefined,
    Symbol,
}

/// The raw payload of a primitive descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PrimitiveRepr {
    Bool(bool),
    Num(f64),
    Str(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "category", rename_all = "lowercase")]
pub enum ValueDescriptor {
    Primitive {
        #[serde(rename = "type")]
        kind: PrimitiveKind,
        #[serde(skip_serializing_if = "Option::is_none")]
        value: Option<PrimitiveRepr>,
        /// The `toString()` form of a symbol; symbols carry nothing else.
        #[serde(skip_serializing_if = "Option::is_none")]
        str: Option<String>,
    },
    Compound {
        /// Index into the heap attached to the same described value.
        at: usize,
    },
}

impl ValueDescriptor {
    #[must_use]
    pub fn undefined() -> Self {
        Self::Primitive {
            kind: PrimitiveKind::Undefined,
            value: None,
            str: None,
        }
    }

    #[must_use]
    pub fn number(n: f64) -> Self {
        Self::Primitive {
            kind: PrimitiveKind::Number,
            value: Some(PrimitiveRepr::Num(n)),
            str: None,
        }
    }

    #[must_use]
    pub fn string(s: impl Into<String>) -> Self {
        Self::Primitive {
            kind: PrimitiveKind::String,
            value: Some(PrimitiveRepr::Str(s.into())),
            str: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HeapKind {
    Object,
    Array,
    Function,
    Promise,
}

/// One compound value in a described heap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeapObject {
    #[serde(rename = "type")]
    pub kind: HeapKind,
    /// Enumerable own properties, in enumeration order. Array elements
    /// appear here under their index keys.
    pub entries: Vec<(String, ValueDescriptor)>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub length: Option<u32>,
    /// Constructor name of class instances.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cname: Option<String>,
}

/// A self-contained `(descriptor, heap)` pair. Every `at` index inside the
/// descriptor and the heap refers into this heap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DescribedValue {
    pub descriptor: ValueDescriptor,
    pub heap: Vec<HeapObject>,
}

impl DescribedValue {
    #[must_use]
    pub fn undefined() -> Self {
        Self {
            descriptor: ValueDescriptor::undefined(),
            heap: Vec::new(),
        }
    }
}

/// Describes a runtime value with a fresh heap and writer map.
#[must_use]
pub fn describe(value: &Value) -> DescribedValue {
    let mut writer = Writer {
        heap: Vec::new(),
        seen: AHashMap::new(),
    };
    let descriptor = writer.describe(value);
    DescribedValue {
        descriptor,
        heap: writer.heap,
    }
}

struct Writer {
    heap: Vec<HeapObject>,
    /// Object identity → heap slot.
    seen: AHashMap<usize, usize>,
}

impl Writer {
    fn describe(&mut self, value: &Value) -> ValueDescriptor {
        match value {
            Value::Undefined => ValueDescriptor::undefined(),
            Value::Null => ValueDescriptor::Primitive {
                kind: PrimitiveKind::Null,
                value: None,
                str: None,
            },
            Value::Bool(b) => ValueDescriptor::Primitive {
                kind: PrimitiveKind::Boolean,
                value: Some(PrimitiveRepr::Bool(*b)),
                str: None,
            },
            Value::Number(n) => ValueDescriptor::number(*n),
            Value::Str(s) => ValueDescriptor::string(s.to_string()),
            // An already-described handle should never reach the describer;
            // encode it as an opaque empty object if it does.
            Value::Described(_) => {
                let at = self.heap.len();
                self.heap.push(HeapObject {
                    kind: HeapKind::Object,
                    entries: Vec::new(),
                    length: None,
                    cname: None,
                });
                ValueDescriptor::Compound { at }
            }
            Value::Object(obj) => {
                let identity = Rc::as_ptr(obj) as usize;
                if let Some(&at) = self.seen.get(&identity) {
                    return ValueDescriptor::Compound { at };
                }
                let at = self.heap.len();
                self.seen.insert(identity, at);
                // Reserve the slot before recursing so cycles hit the
                // writer map instead of recursing forever.
                self.heap.push(HeapObject {
                    kind: HeapKind::Object,
                    entries: Vec::new(),
                    length: None,
                    cname: None,
                });
                let built = self.build_heap_object(obj);
                self.heap[at] = built;
                ValueDescriptor::Compound { at }
            }
        }
    }

    fn build_heap_object(&mut self, obj: &crate::value::ObjRef) -> HeapObject {
        let (kind, length, cname, entry_values) = {
            let borrowed = obj.borrow();
            let mut entry_values: Vec<(String, Value)> = Vec::new();
            let (kind, length) = match &borrowed.kind {
                ObjectKind::Array(elements) => {
                    for (index, element) in elements.iter().enumerate() {
                        entry_values.push((index.to_string(), element.clone()));
                    }
                    (HeapKind::Array, Some(elements.len() as u32))
                }
                ObjectKind::Function(_) | ObjectKind::Native(_) => (HeapKind::Function, None),
                ObjectKind::Plain => {
                    if is_thenable(&borrowed) {
                        (HeapKind::Promise, None)
                    } else {
                        (HeapKind::Object, None)
                    }
                }
            };
            for (key, value) in &borrowed.properties {
                entry_values.push((key.clone(), value.clone()));
            }
            let cname = match kind {
                HeapKind::Object => borrowed.class_name.as_ref().map(ToString::to_string),
                _ => None,
            };
            (kind, length, cname, entry_values)
        };
        // The borrow is released before recursion: cyclic structures reach
        // this object again through the writer map, not through a re-borrow.
        let entries = entry_values
            .into_iter()
            .map(|(key, value)| {
                let descriptor = self.describe(&value);
                (key, descriptor)
            })
            .collect();
        HeapObject {
            kind,
            entries,
            length,
            cname,
        }
    }
}

/// Promise detection is structural: anything carrying callable `then` and
/// `catch` members describes as a promise.
fn is_thenable(obj: &crate::value::JsObject) -> bool {
    let callable = |name: &str| obj.properties.get(name).is_some_and(Value::is_callable);
    callable("then") && callable("catch")
}

/// A value revived from a described pair. Compounds are opaque
/// reconstructions; they carry structure but no behavior.
#[derive(Debug, Clone)]
pub enum Revived {
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    Str(String),
    /// The `toString()` form of a described symbol.
    Symbol(String),
    Ref(Rc<RefCell<RevivedObject>>),
}

#[derive(Debug, Clone)]
pub struct RevivedObject {
    pub kind: RevivedKind,
    pub entries: Vec<(String, Revived)>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RevivedKind {
    Object { cname: Option<String> },
    Array { length: u32 },
    /// An opaque no-op stand-in for a described function.
    Function,
    /// A never-settling stand-in for a described promise.
    Promise,
}

/// Inverts [`describe`]. Revived objects are memoized by heap index so
/// shared structure and cycles are restored faithfully.
#[must_use]
pub fn undescribe(described: &DescribedValue) -> Revived {
    let mut revived: Vec<Option<Rc<RefCell<RevivedObject>>>> = vec![None; described.heap.len()];
    revive(&described.descriptor, &described.heap, &mut revived)
}

fn revive(
    descriptor: &ValueDescriptor,
    heap: &[HeapObject],
    revived: &mut Vec<Option<Rc<RefCell<RevivedObject>>>>,
) -> Revived {
    match descriptor {
        ValueDescriptor::Primitive { kind, value, str } => match kind {
            PrimitiveKind::Undefined => Revived::Undefined,
            PrimitiveKind::Null => Revived::Null,
            PrimitiveKind::Boolean => match value {
                Some(PrimitiveRepr::Bool(b)) => Revived::Bool(*b),
                _ => Revived::Bool(false),
            },
            PrimitiveKind::Number => match value {
                Some(PrimitiveRepr::Num(n)) => Revived::Number(*n),
                _ => Revived::Number(f64::NAN),
            },
            PrimitiveKind::String => match value {
                Some(PrimitiveRepr::Str(s)) => Revived::Str(s.clone()),
                _ => Revived::Str(String::new()),
            },
            PrimitiveKind::Symbol => Revived::Symbol(str.clone().unwrap_or_default()),
        },
        ValueDescriptor::Compound { at } => {
            let Some(heap_object) = heap.get(*at) else {
                return Revived::Undefined;
            };
            if let Some(existing) = &revived[*at] {
                return Revived::Ref(existing.clone());
            }
            let kind = match heap_object.kind {
                HeapKind::Object => RevivedKind::Object {
                    cname: heap_object.cname.clone(),
                },
                HeapKind::Array => RevivedKind::Array {
                    length: heap_object.length.unwrap_or(heap_object.entries.len() as u32),
                },
                HeapKind::Function => RevivedKind::Function,
                HeapKind::Promise => RevivedKind::Promise,
            };
            let node = Rc::new(RefCell::new(RevivedObject {
                kind,
                entries: Vec::new(),
            }));
            // Memoize before filling entries so cycles resolve to the node
            // under construction.
            revived[*at] = Some(node.clone());
            let entries: Vec<(String, Revived)> = heap_object
                .entries
                .iter()
                .map(|(key, descriptor)| (key.clone(), revive(descriptor, heap, revived)))
                .collect();
            node.borrow_mut().entries = entries;
            Revived::Ref(node)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{HeapKind, PrimitiveKind, PrimitiveRepr, Revived, RevivedKind, ValueDescriptor, describe, undescribe};
    use crate::value::{JsObject, Value};

    #[test]
    fn primitives_describe_in_place() {
        let described = describe(&Value::Number(3.0));
        assert_eq!(described.descriptor, ValueDescriptor::number(3.0));
        assert!(described.heap.is_empty());
    }

    #[test]
    fn shared_substructure_is_described_once() {
        let inner = Value::object(JsObject::plain());
        let mut outer = JsObject::plain();
        outer.properties.insert("a".to_owned(), inner.clone());
        outer.properties.insert("b".to_owned(), inner);
        let described = describe(&Value::object(outer));
        assert_eq!(described.heap.len(), 2);
        let entries = &described.heap[0].entries;
        assert_eq!(entries[0].1, ValueDescriptor::Compound { at: 1 });
        assert_eq!(entries[1].1, ValueDescriptor::Compound { at: 1 });
    }

    #[test]
    fn cycles_terminate() {
        let obj = Value::object(JsObject::plain());
        if let Value::Object(inner) = &obj {
            inner.borrow_mut().properties.insert("self".to_owned(), obj.clone());
        }
        let described = describe(&obj);
        assert_eq!(described.heap.len(), 1);
        assert_eq!(described.heap[0].entries[0].1, ValueDescriptor::Compound { at: 0 });
    }

    #[test]
    fn arrays_carry_length_and_index_entries() {
        let arr = Value::object(JsObject::array(vec![Value::Number(1.0), Value::str("x")]));
        let described = describe(&arr);
        assert_eq!(described.heap[0].kind, HeapKind::Array);
        assert_eq!(described.heap[0].length, Some(2));
        assert_eq!(described.heap[0].entries[0].0, "0");
        assert_eq!(
            described.heap[0].entries[1].1,
            ValueDescriptor::Primitive {
                kind: PrimitiveKind::String,
                value: Some(PrimitiveRepr::Str("x".to_owned())),
                str: None,
            }
        );
    }

    #[test]
    fn undescribe_restores_cycles() {
        let obj = Value::object(JsObject::plain());
        if let Value::Object(inner) = &obj {
            inner.borrow_mut().properties.insert("self".to_owned(), obj.clone());
        }
        let revived = undescribe(&describe(&obj));
        let Revived::Ref(node) = revived else {
            panic!("expected a revived object");
        };
        let node_ref = node.borrow();
        let Revived::Ref(back) = &node_ref.entries[0].1 else {
            panic!("expected a cyclic reference");
        };
        assert!(std::rc::Rc::ptr_eq(&node, back));
    }

    #[test]
    fn undescribe_tags_classes_and_arrays() {
        let mut instance = JsObject::plain();
        instance.class_name = Some("Point".into());
        let described = describe(&Value::object(instance));
        let Revived::Ref(node) = undescribe(&described) else {
            panic!("expected a revived object");
        };
        assert_eq!(
            node.borrow().kind,
            RevivedKind::Object {
                cname: Some("Point".to_owned())
            }
        );
    }
}
