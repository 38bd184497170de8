use std::sync::Arc;

use serde_json::{Map, Number, Value};

use crate::chain::Chain;
use crate::pipe::{take_or_clone, Builder, Built, Stage};
use crate::{Error, Result};

#[derive(Debug)]
enum Shape {
    Map(Map<String, Value>),
    List(Vec<Value>),
}

#[derive(Debug)]
pub struct ValueBuilder {
    shape: Shape,
    stage: Stage,
    built: Option<Built>,
}

impl ValueBuilder {
    pub fn map() -> Self {
        Self::with_shape(Shape::Map(Map::new()))
    }

    pub fn list() -> Self {
        Self::with_shape(Shape::List(Vec::new()))
    }

    pub fn for_tag(tag: &[u8]) -> Self {
        if is_list_tag(tag) {
            Self::list()
        } else {
            Self::map()
        }
    }

    fn with_shape(shape: Shape) -> Self {
        Self {
            shape,
            stage: Stage::Unattached,
            built: None,
        }
    }

    fn insert(&mut self, key: &[u8], value: Value) {
        match &mut self.shape {
            Shape::Map(map) => {
                map.insert(String::from_utf8_lossy(key).into_owned(), value);
            }
            Shape::List(list) => list.push(value),
        }
    }

    fn guard(&mut self) -> Result<()> {
        if self.built.is_some() {
            return Err(Error::state("value builder already produced its result"));
        }
        self.stage.accept()
    }
}

pub fn is_list_tag(tag: &[u8]) -> bool {
    matches!(tag, b"$L" | b"L" | b"A")
}

pub fn scalar(tag: &[u8], value: &Chain) -> Value {
    let text = value.to_str_lossy();
    let parsed = match tag {
        b"i" | b"l" | b"I" | b"L" => text.parse::<i64>().ok().map(Value::from),
        b"d" | b"D" | b"f" | b"F" => text
            .parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map(Value::Number),
        b"b" | b"B" => match text.as_ref() {
            "1" | "true" | "TRUE" | "True" => Some(Value::Bool(true)),
            "0" | "false" | "FALSE" | "False" => Some(Value::Bool(false)),
            _ => None,
        },
        b"$" => literal(&text),
        _ => None,
    };
    parsed.unwrap_or_else(|| Value::String(text.into_owned()))
}

fn literal(text: &str) -> Option<Value> {
    match text {
        "" => Some(Value::Null),
        "true" => Some(Value::Bool(true)),
        "false" => Some(Value::Bool(false)),
        _ => serde_json::from_str::<Number>(text).ok().map(Value::Number),
    }
}

impl Builder for ValueBuilder {
    fn create(&mut self, _key: &[u8]) -> Result<()> {
        self.stage.create()
    }

    fn open(&mut self, tag: &Chain, _key: &Chain) -> Result<Option<Box<dyn Builder>>> {
        self.guard()?;
        Ok(Some(Box::new(ValueBuilder::for_tag(tag.as_bytes()))))
    }

    fn emit(&mut self, tag: &Chain, key: &Chain, value: &Chain) -> Result<()> {
        self.guard()?;
        self.insert(key.as_bytes(), scalar(tag.as_bytes(), value));
        Ok(())
    }

    fn receive(&mut self, key: &[u8], value: Built) -> Result<()> {
        self.guard()?;
        let value = take_or_clone::<Value>(value)?;
        self.insert(key, value);
        Ok(())
    }

    fn result(&mut self) -> Option<Built> {
        if self.built.is_none() {
            let value = match &mut self.shape {
                Shape::Map(map) => Value::Object(std::mem::take(map)),
                Shape::List(list) => Value::Array(std::mem::take(list)),
            };
            self.built = Some(Arc::new(value));
        }
        self.built.clone()
    }

    fn destroy(&mut self) {
        self.stage.destroy();
        self.built = None;
    }
}
