mod common;

use common::*;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};
use yggdrasil::{
    Class, ClassResolver, Config, Constant, Error, FieldContext, FieldHandler, FieldInfo,
    FieldValue, Gc, MissingField, Primitive, PseudoEnum, PseudoEnumBuilder, PseudoEnumFamily,
    Reflect, Result, Serializable, Value, Yggdrasil,
};

mod old {
    use super::*;

    #[derive(Yggdrasil, Default, Debug)]
    pub struct Record {
        pub id: i32,
        pub label: String,
    }

    #[derive(Yggdrasil, Default)]
    pub struct Bag {
        pub count: i32,
        pub items: Vec<Option<i32>>,
        pub things: Vec<Value>,
    }

    #[derive(Yggdrasil, Default)]
    pub struct Tally {
        pub amount: String,
    }

    #[derive(Yggdrasil, Clone, Copy, Debug, PartialEq)]
    pub enum Shade {
        Red,
        Crimson,
    }

    #[derive(Yggdrasil, Default)]
    pub struct Palette {
        pub shade: Option<Shade>,
    }
}

mod new {
    use super::*;

    #[derive(Yggdrasil, Default, Debug)]
    pub struct Record {
        pub id: i32,
        pub text: String,
    }

    #[derive(Yggdrasil, Default, Debug)]
    pub struct Renamed {
        pub id: i32,
        pub label: String,
        #[yggdrasil(default)]
        pub note: Option<String>,
    }

    #[derive(Yggdrasil, Default)]
    pub struct Bag {
        pub count: Option<i32>,
        pub items: Vec<i32>,
        pub things: Vec<Gc<Thing>>,
    }

    #[derive(Yggdrasil, Default, Debug)]
    pub struct Tally {
        pub amount: i32,
    }

    #[derive(Yggdrasil, Clone, Copy, Debug, PartialEq)]
    pub enum Shade {
        Red,
        #[yggdrasil(alias = "Crimson")]
        Scarlet,
    }

    #[derive(Yggdrasil, Default)]
    pub struct Palette {
        pub shade: Option<Shade>,
    }
}

fn record() -> Gc<old::Record> {
    Rc::new(RefCell::new(old::Record {
        id: 7,
        label: "seven".into(),
    }))
}

fn writer() -> Yggdrasil {
    let ygg = engine();
    ygg.register_single_class(old::Record::type_class(), "Record")
        .unwrap();
    ygg
}

/// Resolves the id a class was written under before it was renamed. Never used to write.
struct Legacy(Class);

impl ClassResolver for Legacy {
    fn resolve(&self, id: &str) -> Option<Class> {
        (id == "OldRecord").then_some(self.0)
    }

    fn identify(&self, _class: &Class) -> Option<String> {
        None
    }
}

#[test]
fn renamed_class_through_config() {
    let old = engine();
    old.register_single_class(old::Record::type_class(), "OldRecord")
        .unwrap();
    let bytes = to_binary(&old, &record());

    let config = Config {
        type_aliases: HashMap::from([("OldRecord".to_string(), "Renamed".to_string())]),
        ..Default::default()
    };
    let ygg = Yggdrasil::with_config(config);
    ygg.register_single_class(new::Renamed::type_class(), "Renamed")
        .unwrap();
    let back: Gc<new::Renamed> = from_binary(&ygg, &bytes);
    assert_eq!(back.borrow().id, 7);
    assert_eq!(back.borrow().label, "seven");
    assert_eq!(back.borrow().note, None);
}

#[test]
fn renamed_class_through_resolver() {
    let old = engine();
    old.register_single_class(old::Record::type_class(), "OldRecord")
        .unwrap();
    let bytes = to_binary(&old, &record());

    let ygg = Yggdrasil::new();
    ygg.register_single_class(new::Renamed::type_class(), "Renamed")
        .unwrap();
    ygg.register_class_resolver(Arc::new(Legacy(new::Renamed::type_class())))
        .unwrap();
    let back: Gc<new::Renamed> = from_binary(&ygg, &bytes);
    assert_eq!(back.borrow().label, "seven");

    // Written under the current id only.
    let again = to_binary(&ygg, &back);
    assert!(again.windows(7).any(|w| w == b"Renamed"));
    assert!(!again.windows(9).any(|w| w == b"OldRecord"));
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

#[test]
fn unrepaired_field_asks_each_handler_once() {
    let bytes = to_binary(&writer(), &record());

    let counting = Arc::new(Counting::default());
    let ygg = engine();
    ygg.register_single_class(new::Record::type_class(), "Record")
        .unwrap();
    ygg.register_field_handler(counting.clone()).unwrap();
    ygg.register_field_handler(counting.clone()).unwrap();

    let mut input = ygg.new_input_stream(&bytes[..]).unwrap();
    let result = input.read::<Gc<new::Record>>();
    assert!(matches!(result, Err(Error::StreamCorrupted(_))));
    assert_eq!(counting.missing.load(Ordering::SeqCst), 1);
    assert_eq!(counting.incompatible.load(Ordering::SeqCst), 0);
}

fn tally(amount: &str) -> Vec<u8> {
    let old = engine();
    old.register_single_class(old::Tally::type_class(), "Tally")
        .unwrap();
    let tally: Gc<old::Tally> = Rc::new(RefCell::new(old::Tally {
        amount: amount.into(),
    }));
    to_binary(&old, &tally)
}

fn tally_reader() -> Yggdrasil {
    let ygg = engine();
    ygg.register_single_class(new::Tally::type_class(), "Tally")
        .unwrap();
    ygg
}

#[test]
fn retyped_field_asks_each_handler_once() {
    let bytes = tally("42");
    let first = Arc::new(Counting::default());
    let second = Arc::new(Counting::default());
    let ygg = tally_reader();
    ygg.register_field_handler(first.clone()).unwrap();
    ygg.register_field_handler(second.clone()).unwrap();

    let mut input = ygg.new_input_stream(&bytes[..]).unwrap();
    let result = input.read::<Gc<new::Tally>>();
    assert!(matches!(result, Err(Error::StreamCorrupted(_))));
    for counting in [&first, &second] {
        assert_eq!(counting.incompatible.load(Ordering::SeqCst), 1);
        assert_eq!(counting.missing.load(Ordering::SeqCst), 0);
    }
}

/// Parses a string that used to hold a number.
struct ParseAmount;

impl FieldHandler for ParseAmount {
    fn missing_field(&self, _object: &mut dyn Serializable, _field: &MissingField) -> Result<bool> {
        Ok(false)
    }

    fn incompatible_field_type(
        &self,
        object: &mut dyn Serializable,
        field: &FieldInfo,
        entry: &FieldContext,
    ) -> Result<bool> {
        let FieldValue::Object(Value::String(text)) = &entry.value else {
            return Ok(false);
        };
        let Ok(n) = text.parse::<i32>() else {
            return Ok(false);
        };
        Ok(matches!(
            object.assign(field.name, FieldValue::Primitive(Primitive::Int(n))),
            yggdrasil::Assign::Done
        ))
    }
}

#[test]
fn retyped_field_repaired_by_later_handler() {
    let counting = Arc::new(Counting::default());
    let ygg = tally_reader();
    ygg.register_field_handler(Arc::new(ParseAmount)).unwrap();
    ygg.register_field_handler(counting.clone()).unwrap();

    let back: Gc<new::Tally> = from_binary(&ygg, &tally("42"));
    assert_eq!(back.borrow().amount, 42);
    assert_eq!(counting.incompatible.load(Ordering::SeqCst), 1);

    let bytes = tally("forty");
    let mut input = ygg.new_input_stream(&bytes[..]).unwrap();
    assert!(matches!(
        input.read::<Gc<new::Tally>>(),
        Err(Error::StreamCorrupted(_))
    ));
    assert_eq!(counting.incompatible.load(Ordering::SeqCst), 2);
}

/// Stores a dropped `label` into `text`.
struct Relabel;

impl FieldHandler for Relabel {
    fn missing_field(&self, object: &mut dyn Serializable, field: &MissingField) -> Result<bool> {
        match field {
            MissingField::Unknown(entry) if entry.name == "label" => Ok(matches!(
                object.assign("text", entry.value.clone()),
                yggdrasil::Assign::Done
            )),
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
fn handler_repairs_dropped_field() {
    let bytes = to_binary(&writer(), &record());

    let counting = Arc::new(Counting::default());
    let ygg = engine();
    ygg.register_single_class(new::Record::type_class(), "Record")
        .unwrap();
    ygg.register_field_handler(counting.clone()).unwrap();
    ygg.register_field_handler(Arc::new(Relabel)).unwrap();

    let back: Gc<new::Record> = from_binary(&ygg, &bytes);
    assert_eq!(back.borrow().id, 7);
    assert_eq!(back.borrow().text, "seven");
    assert_eq!(counting.missing.load(Ordering::SeqCst), 0);
}

#[test]
fn shapes_are_converted() {
    let old_engine = engine();
    old_engine
        .register_single_class(old::Bag::type_class(), "Bag")
        .unwrap();
    let shared = Value::Object(yggdrasil::Handle::new(Thing::new("kept", 2.0)));
    let bag: Gc<old::Bag> = Rc::new(RefCell::new(old::Bag {
        count: 3,
        items: vec![Some(1), Some(2)],
        things: vec![shared.clone(), shared],
    }));
    let bytes = to_binary(&old_engine, &bag);

    let ygg = engine();
    ygg.register_single_class(new::Bag::type_class(), "Bag")
        .unwrap();
    let back: Gc<new::Bag> = from_binary(&ygg, &bytes);
    let back = back.borrow();
    assert_eq!(back.count, Some(3));
    assert_eq!(back.items, [1, 2]);
    assert_eq!(back.things.len(), 2);
    assert_eq!(back.things[0].borrow().name, "kept");
    assert!(Rc::ptr_eq(&back.things[0], &back.things[1]));
}

#[test]
fn nulls_are_not_unboxed() {
    let old_engine = engine();
    old_engine
        .register_single_class(old::Bag::type_class(), "Bag")
        .unwrap();
    let bag: Gc<old::Bag> = Rc::new(RefCell::new(old::Bag {
        count: 3,
        items: vec![Some(1), None],
        things: Vec::new(),
    }));
    let bytes = to_binary(&old_engine, &bag);

    let ygg = engine();
    ygg.register_single_class(new::Bag::type_class(), "Bag")
        .unwrap();
    let mut input = ygg.new_input_stream(&bytes[..]).unwrap();
    assert!(matches!(
        input.read::<Gc<new::Bag>>(),
        Err(Error::StreamCorrupted(_))
    ));
}

#[test]
fn enum_constant_aliases() {
    let old_engine = Yggdrasil::new();
    old_engine
        .register_single_class(Class::enumeration::<old::Shade>(), "Shade")
        .unwrap();
    old_engine
        .register_single_class(old::Palette::type_class(), "Palette")
        .unwrap();
    let palette: Gc<old::Palette> = Rc::new(RefCell::new(old::Palette {
        shade: Some(old::Shade::Crimson),
    }));
    let bytes = to_binary(&old_engine, &palette);

    let ygg = Yggdrasil::new();
    ygg.register_single_class(Class::enumeration::<new::Shade>(), "Shade")
        .unwrap();
    ygg.register_single_class(new::Palette::type_class(), "Palette")
        .unwrap();
    let back: Gc<new::Palette> = from_binary(&ygg, &bytes);
    assert_eq!(back.borrow().shade, Some(new::Shade::Scarlet));

    // Unknown constants are not guessed.
    let unknown = hex::decode("5967670000014005536861646504426c7565").unwrap();
    let mut input = ygg.new_input_stream(&unknown[..]).unwrap();
    assert!(matches!(
        input.read::<new::Shade>(),
        Err(Error::StreamCorrupted(_))
    ));
}

struct Planet {
    mass: f64,
}

impl PseudoEnumFamily for Planet {
    fn registry() -> &'static PseudoEnum<Self> {
        static REGISTRY: OnceLock<PseudoEnum<Planet>> = OnceLock::new();
        REGISTRY.get_or_init(|| {
            let builder = || -> Result<PseudoEnum<Planet>> {
                Ok(PseudoEnumBuilder::new("Planet")
                    .constant("MERCURY", Planet { mass: 3.30e23 })?
                    .constant("EARTH", Planet { mass: 5.97e24 })?
                    .alias("TERRA", "EARTH")?
                    .build())
            };
            builder().unwrap()
        })
    }
}

#[derive(Yggdrasil, Default)]
struct Orbit {
    planet: Option<Constant<Planet>>,
    period: f64,
}

#[test]
fn pseudo_enum_constants_keep_identity() {
    let ygg = Yggdrasil::new();
    ygg.register_single_class(Class::pseudo_enum::<Planet>(), "Planet")
        .unwrap();
    ygg.register_single_class(Orbit::type_class(), "Orbit")
        .unwrap();

    let earth = Planet::registry().value_of("EARTH").cloned();
    let orbit: Gc<Orbit> = Rc::new(RefCell::new(Orbit {
        planet: earth.clone(),
        period: 365.25,
    }));
    let back: Gc<Orbit> = from_xml(&ygg, &to_xml(&ygg, &orbit));
    let back = back.borrow();
    assert_eq!(back.planet, earth);
    assert_eq!(back.planet.as_ref().map(|p| p.mass), Some(5.97e24));

    let xml = r#"<yggdrasil version="1"><enum type="Planet">TERRA</enum></yggdrasil>"#;
    let terra: Constant<Planet> = from_xml(&ygg, xml);
    assert_eq!(Some(terra), earth);
}
