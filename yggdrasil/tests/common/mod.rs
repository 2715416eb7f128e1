#![allow(dead_code)]

use std::collections::BTreeMap;
use yggdrasil::{Class, Field, Gc, Reflect, Type, Yggdrasil};

#[derive(Yggdrasil, Default, Debug, Clone, PartialEq)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

#[derive(Yggdrasil, Default, Debug)]
pub struct Thing {
    pub name: String,
    pub weight: f64,
    pub tags: Vec<String>,
    pub next: Option<Gc<Thing>>,
}

impl Thing {
    pub fn new(name: &str, weight: f64) -> Thing {
        Thing {
            name: name.into(),
            weight,
            ..Default::default()
        }
    }
}

#[derive(Yggdrasil, Default)]
pub struct Node {
    pub value: i32,
    pub next: Option<Gc<Node>>,
}

#[derive(Yggdrasil, Clone, Copy, Debug, PartialEq)]
pub enum Color {
    Red,
    Green,
    Blue,
}

#[derive(Yggdrasil, Default, Debug, PartialEq)]
pub struct Everything {
    pub byte: i8,
    pub short: i16,
    pub int: i32,
    pub long: i64,
    pub float: f32,
    pub double: f64,
    pub letter: char,
    pub flag: bool,
    pub boxed: Option<i64>,
    pub text: String,
    pub bytes: Vec<i8>,
    pub doubles: Vec<f64>,
    pub grid: Vec<Vec<i32>>,
    pub chars: Vec<char>,
    pub names: Vec<Option<String>>,
    pub color: Option<Color>,
    pub kind: Option<Type>,
    pub scores: BTreeMap<String, i32>,
}

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Engine with every test type registered under its short name.
pub fn engine() -> Yggdrasil {
    let ygg = Yggdrasil::new();
    register_all(&ygg);
    ygg
}

pub fn register_all(ygg: &Yggdrasil) {
    init_logger();
    ygg.register_single_class(Point::type_class(), "Point").unwrap();
    ygg.register_single_class(Thing::type_class(), "Thing").unwrap();
    ygg.register_single_class(Node::type_class(), "Node").unwrap();
    ygg.register_single_class(Class::enumeration::<Color>(), "Color")
        .unwrap();
    ygg.register_single_class(Everything::type_class(), "Everything")
        .unwrap();
}

pub fn to_binary<T: Field>(ygg: &Yggdrasil, value: &T) -> Vec<u8> {
    let mut out = ygg.new_output_stream(Vec::new()).unwrap();
    out.write(value).unwrap();
    out.close().unwrap()
}

pub fn from_binary<T: Field>(ygg: &Yggdrasil, bytes: &[u8]) -> T {
    let mut input = ygg.new_input_stream(bytes).unwrap();
    let value = input.read().unwrap();
    input.close().unwrap();
    value
}

pub fn to_xml<T: Field>(ygg: &Yggdrasil, value: &T) -> String {
    let mut out = ygg.new_xml_output_stream(Vec::new()).unwrap();
    out.write(value).unwrap();
    String::from_utf8(out.close().unwrap()).unwrap()
}

pub fn from_xml<T: Field>(ygg: &Yggdrasil, xml: &str) -> T {
    let mut input = ygg.new_xml_input_stream(xml.as_bytes()).unwrap();
    let value = input.read().unwrap();
    input.close().unwrap();
    value
}
