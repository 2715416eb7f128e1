use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use yggdrasil::{
    Assign, Error, FieldContext, FieldHandler, FieldInfo, FieldValue, Fields, MissingField,
    Primitive, Repair, Result, Serializable, Value,
};
use yggdrasil_derive::Yggdrasil;

mod evolving {
    use super::*;

    pub mod ev0 {
        use super::*;

        #[derive(Yggdrasil, Default, Debug)]
        pub struct MyStruct {
            pub x: i32,
            pub label: String,
        }
    }

    pub mod ev1 {
        use super::*;

        /// `x` renamed to `z` in source, wire name kept.
        #[derive(Yggdrasil, Default, Debug)]
        pub struct MyStruct {
            #[yggdrasil(rename = "x")]
            pub z: i32,
            pub label: String,
            #[yggdrasil(default)]
            pub added: Option<String>,
        }
    }

    pub mod ev2 {
        use super::*;

        /// `label` dropped, `x` widened to a long. Repairs itself.
        #[derive(Yggdrasil, Default, Debug)]
        #[yggdrasil(extended)]
        pub struct MyStruct {
            pub x: i64,
            #[yggdrasil(skip)]
            pub dropped: Vec<String>,
        }

        impl Serializable for MyStruct {
            fn missing_field(&mut self, field: &MissingField) -> Result<bool> {
                match field {
                    MissingField::Unknown(entry) => {
                        self.dropped.push(entry.name.clone());
                        Ok(true)
                    }
                    MissingField::Absent(_) => Ok(false),
                }
            }

            fn incompatible_field_type(
                &mut self,
                field: &FieldInfo,
                entry: &FieldContext,
            ) -> Result<bool> {
                match (field.name, &entry.value) {
                    ("x", FieldValue::Primitive(Primitive::Int(v))) => {
                        self.x = *v as i64;
                        Ok(true)
                    }
                    _ => Ok(false),
                }
            }
        }
    }

    pub mod ev3 {
        use super::*;

        #[derive(Yggdrasil, Default, Debug)]
        pub struct MyStruct {
            pub x: i32,
            pub text: String,
        }
    }
}

use evolving::*;

fn fields_of_ev0() -> Fields {
    let v0 = ev0::MyStruct {
        x: 42,
        label: "answer".into(),
    };
    Fields::from_object(&v0).unwrap()
}

#[derive(Default)]
struct Counting {
    missing: AtomicUsize,
    incompatible: AtomicUsize,
}

impl FieldHandler for Counting {
    fn missing_field(&self, _object: &mut dyn Serializable, _field: &MissingField) -> Result<bool> {
        self.missing.fetch_add(1, Ordering::SeqCst);
        Ok(false)
    }

    fn incompatible_field_type(
        &self,
        _object: &mut dyn Serializable,
        _field: &FieldInfo,
        _entry: &FieldContext,
    ) -> Result<bool> {
        self.incompatible.fetch_add(1, Ordering::SeqCst);
        Ok(false)
    }
}

/// Moves the old `label` into `text`.
struct Relabel;

impl FieldHandler for Relabel {
    fn missing_field(&self, object: &mut dyn Serializable, field: &MissingField) -> Result<bool> {
        match field {
            MissingField::Unknown(entry) if entry.name == "label" => {
                Ok(matches!(object.assign("text", entry.value.clone()), Assign::Done))
            }
            MissingField::Absent(info) => Ok(info.name == "text"),
            _ => Ok(false),
        }
    }

    fn incompatible_field_type(
        &self,
        _object: &mut dyn Serializable,
        _field: &FieldInfo,
        _entry: &FieldContext,
    ) -> Result<bool> {
        Ok(false)
    }
}

#[test]
fn renamed_field_keeps_wire_name() {
    let mut v1 = ev1::MyStruct::default();
    fields_of_ev0()
        .apply_to(&mut v1, &Repair::none())
        .unwrap();
    assert_eq!(v1.z, 42);
    assert_eq!(v1.label, "answer");
    assert_eq!(v1.added, None);
}

#[test]
fn object_repairs_itself() {
    let mut v2 = ev2::MyStruct::default();
    fields_of_ev0()
        .apply_to(&mut v2, &Repair::none())
        .unwrap();
    assert_eq!(v2.x, 42);
    assert_eq!(v2.dropped, ["label"]);
}

#[test]
fn unhandled_unknown_field() {
    let counting: Arc<dyn FieldHandler> = Arc::new(Counting::default());
    let handlers = [counting.clone()];
    let mut fields = fields_of_ev0();
    fields.put_object("extra", Value::Null);
    let mut v1 = ev1::MyStruct::default();
    let result = fields.apply_to(&mut v1, &Repair::new(&handlers));
    assert!(matches!(result, Err(Error::StreamCorrupted(_))));
}

#[test]
fn handlers_are_asked_once() {
    let counting = Arc::new(Counting::default());
    let handlers: [Arc<dyn FieldHandler>; 1] = [counting.clone()];

    let mut v3 = ev3::MyStruct::default();
    let result = fields_of_ev0().apply_to(&mut v3, &Repair::new(&handlers));
    assert!(matches!(result, Err(Error::StreamCorrupted(_))));
    assert_eq!(counting.missing.load(Ordering::SeqCst), 1);
    assert_eq!(counting.incompatible.load(Ordering::SeqCst), 0);

    let mut fields = Fields::new();
    fields.put("x", &"not a number".to_string());
    fields.put("text", &String::new());
    let result = fields.apply_to(&mut v3, &Repair::new(&handlers));
    assert!(matches!(result, Err(Error::StreamCorrupted(_))));
    assert_eq!(counting.incompatible.load(Ordering::SeqCst), 1);
}

#[test]
fn handler_chain_in_order() {
    let counting = Arc::new(Counting::default());
    let handlers: [Arc<dyn FieldHandler>; 2] = [Arc::new(Relabel), counting.clone()];
    let mut v3 = ev3::MyStruct::default();
    fields_of_ev0()
        .apply_to(&mut v3, &Repair::new(&handlers))
        .unwrap();
    assert_eq!(v3.x, 42);
    assert_eq!(v3.text, "answer");
    assert_eq!(counting.missing.load(Ordering::SeqCst), 0);
}
