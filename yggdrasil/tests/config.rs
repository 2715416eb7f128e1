mod common;

use common::*;
use std::cell::RefCell;
use std::io::Write;
use std::rc::Rc;
use std::sync::Arc;
use yggdrasil::{Class, ClassResolver, Config, Error, PrimitiveStyle, Reflect, Yggdrasil};

#[test]
fn load_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"(
            xml_primitives: Hex,
            xml_indent: Some(2),
            type_aliases: {{ "Spot": "Point" }},
        )"#
    )
    .unwrap();

    let config = Config::load(file.path()).unwrap();
    assert_eq!(config.xml_primitives, PrimitiveStyle::Hex);
    assert_eq!(config.xml_indent, Some(2));
    assert_eq!(config.type_aliases["Spot"], "Point");

    let ygg = Yggdrasil::with_config(config);
    register_all(&ygg);
    assert_eq!(ygg.config().xml_indent, Some(2));
    let xml = r#"<yggdrasil version="1">
        <object type="Spot" numFields="2"><int name="x">0x00000001</int><int name="y">2</int></object>
    </yggdrasil>"#;
    let point: yggdrasil::Gc<Point> = from_xml(&ygg, xml);
    assert_eq!(*point.borrow(), Point { x: 1, y: 2 });
}

#[test]
fn pretty_string_loads_back() {
    let mut config = Config::default();
    config.type_aliases.insert("Old".into(), "New".into());
    let text = config.to_ron_string_pretty().unwrap();
    assert_eq!(Config::from_ron_str(&text).unwrap(), config);
}

#[test]
fn errors() {
    assert!(matches!(
        Config::from_ron_str("(xml_indent: \"two\")"),
        Err(Error::Config(_))
    ));
    assert!(matches!(
        Config::load("/nonexistent/yggdrasil.ron"),
        Err(Error::Io(_))
    ));
}

#[test]
fn reserved_and_conflicting_ids() {
    let ygg = engine();
    assert!(matches!(
        ygg.register_single_class(<Thing as yggdrasil::Reflect>::type_class(), "Object"),
        Err(Error::Configuration(_))
    ));
    assert!(matches!(
        ygg.register_single_class(<Thing as yggdrasil::Reflect>::type_class(), "Point"),
        Err(Error::Configuration(_))
    ));
    for id in ["int", "string", "Integer", "Point[]", ""] {
        assert!(
            matches!(
                ygg.register_single_class(<Thing as yggdrasil::Reflect>::type_class(), id),
                Err(Error::Configuration(_))
            ),
            "'{id}' was accepted"
        );
    }
    // Same pair again is fine.
    ygg.register_single_class(<Point as yggdrasil::Reflect>::type_class(), "Point")
        .unwrap();
}

/// Claims the name of a builtin type.
struct Shadowing;

impl ClassResolver for Shadowing {
    fn resolve(&self, id: &str) -> Option<Class> {
        (id == "string").then(<Thing as Reflect>::type_class)
    }

    fn identify(&self, class: &Class) -> Option<String> {
        class.is::<Thing>().then(|| "string".to_string())
    }
}

#[test]
fn builtin_names_are_never_written_as_ids() {
    let ygg = Yggdrasil::new();
    ygg.register_class_resolver(Arc::new(Shadowing)).unwrap();
    let thing: yggdrasil::Gc<Thing> = Rc::new(RefCell::new(Thing::new("t", 1.0)));

    let mut out = ygg.new_xml_output_stream(Vec::new()).unwrap();
    assert!(matches!(out.write(&thing), Err(Error::NotSerializable(_))));
    assert!(!ygg.is_serializable(&<Thing as Reflect>::type_class()).unwrap());
}
