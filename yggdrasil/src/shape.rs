use yggdrasil_base::{
    ArrayRef, Assign, FieldContext, FieldHandler, FieldInfo, FieldValue, MissingField, Result,
    Serializable, Type, Value,
};

/// Last handler of every registry: adapts values whose shape changed but whose content still
/// fits, such as a primitive that became boxed or an `Object[]` that became a typed array.
pub struct ShapeConverter;

impl ShapeConverter {
    /// `value` reshaped to fit a field declared as `ty`.
    pub fn convert(value: &FieldValue, ty: &Type) -> Option<FieldValue> {
        match (value, ty) {
            (FieldValue::Primitive(p), Type::Wrapper(tag)) if p.tag().wrapper() == *tag => {
                Some(FieldValue::Object(Value::Boxed(*p)))
            }
            (FieldValue::Primitive(p), Type::Object) => Some(FieldValue::Object(Value::Boxed(*p))),
            (FieldValue::Object(Value::Boxed(p)), Type::Primitive(tag)) if p.tag() == *tag => {
                Some(FieldValue::Primitive(*p))
            }
            (FieldValue::Object(value), ty) => convert_value(value, ty).map(FieldValue::Object),
            _ => None,
        }
    }
}

fn convert_value(value: &Value, ty: &Type) -> Option<Value> {
    if ty.accepts(value) {
        return Some(value.clone());
    }
    match (value, ty) {
        (Value::Array(array), Type::Array(component)) => retype(array, component),
        _ => None,
    }
}

/// Copy of `array` with every element converted to `component`.
fn retype(array: &ArrayRef, component: &Type) -> Option<Value> {
    let elements = {
        let array = array.read().ok()?;
        array
            .elements()
            .iter()
            .map(|e| convert_value(e, component))
            .collect::<Option<Vec<_>>>()?
    };
    ArrayRef::new(component.clone(), elements)
        .ok()
        .map(Value::Array)
}

impl FieldHandler for ShapeConverter {
    fn missing_field(&self, _object: &mut dyn Serializable, _field: &MissingField) -> Result<bool> {
        Ok(false)
    }

    fn incompatible_field_type(
        &self,
        object: &mut dyn Serializable,
        field: &FieldInfo,
        entry: &FieldContext,
    ) -> Result<bool> {
        let Some(converted) = Self::convert(&entry.value, &field.ty) else {
            return Ok(false);
        };
        log::debug!(
            "reshaping '{}' of {} to {:?}",
            field.name,
            object.class().name(),
            field.ty
        );
        Ok(matches!(object.assign(field.name, converted), Assign::Done))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use yggdrasil_base::{Error, Fields, Primitive, Repair, Tag};
    use yggdrasil_derive::Yggdrasil;

    #[derive(Yggdrasil, Default, Debug, PartialEq)]
    #[yggdrasil(crate = "yggdrasil_base")]
    struct Holder {
        items: Vec<i32>,
        count: Option<i32>,
        n: i32,
        names: Vec<String>,
    }

    fn handlers() -> Vec<Arc<dyn FieldHandler>> {
        vec![Arc::new(ShapeConverter)]
    }

    fn boxed_ints(component: Type, values: &[i32]) -> Value {
        let elements = values.iter().map(|v| Value::Boxed(Primitive::Int(*v))).collect();
        Value::Array(ArrayRef::new(component, elements).unwrap())
    }

    #[test]
    fn boxing_and_arrays() {
        let mut fields = Fields::new();
        fields.put_object("items", boxed_ints(Type::Wrapper(Tag::IntObject), &[1, 2]));
        fields.put_primitive("count", Primitive::Int(3));
        fields.put_object("n", Value::Boxed(Primitive::Int(4)));
        let names = vec![Value::from("a"), Value::from("b")];
        fields.put_object(
            "names",
            Value::Array(ArrayRef::new(Type::Object, names).unwrap()),
        );

        let handlers = handlers();
        let mut holder = Holder::default();
        fields.apply_to(&mut holder, &Repair::new(&handlers)).unwrap();
        assert_eq!(
            holder,
            Holder {
                items: vec![1, 2],
                count: Some(3),
                n: 4,
                names: vec!["a".into(), "b".into()],
            }
        );
    }

    #[test]
    fn nulls_do_not_unbox() {
        let integers = ArrayRef::new(
            Type::Wrapper(Tag::IntObject),
            vec![Value::Boxed(Primitive::Int(1)), Value::Null],
        )
        .unwrap();
        let value = FieldValue::Object(Value::Array(integers));
        assert_eq!(
            ShapeConverter::convert(&value, &Type::array_of(Type::Primitive(Tag::Int))),
            None
        );
        assert_eq!(
            ShapeConverter::convert(
                &FieldValue::Object(Value::Null),
                &Type::Primitive(Tag::Int)
            ),
            None
        );
    }

    #[test]
    fn unrelated_types_are_left_alone() {
        let mut fields = Fields::new();
        fields.put_object("n", Value::from("four"));
        fields.put_object("items", Value::Null);
        fields.put_object("count", Value::Null);
        fields.put_object("names", Value::Null);

        let handlers = handlers();
        let mut holder = Holder::default();
        let err = fields.apply_to(&mut holder, &Repair::new(&handlers));
        assert!(matches!(err, Err(Error::StreamCorrupted(_))));
    }
}
