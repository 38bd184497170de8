use std::sync::Arc;

use kat_bind::pipe::record::parse;
use kat_bind::pipe::{take, Built};
use kat_bind::{from_slice, to_value, Builder, Chain, Error, Format, Record, Registry};
use serde_json::json;

#[derive(Debug, Default, PartialEq)]
struct User {
    id: i64,
    name: String,
    roles: Vec<String>,
    home: Option<Address>,
}

#[derive(Debug, Default, PartialEq)]
struct Address {
    city: String,
}

impl Record for User {
    fn accept(&mut self, _tag: &Chain, key: &Chain, value: &Chain) -> kat_bind::Result<()> {
        match key.as_bytes() {
            b"id" => self.id = parse(value)?,
            b"name" => self.name = value.to_string(),
            _ => {}
        }
        Ok(())
    }

    fn explore(&self, _tag: &Chain, key: &Chain, registry: &Arc<Registry>) -> Option<Box<dyn Builder>> {
        match key.as_bytes() {
            b"roles" => registry.builder(b"L"),
            b"home" => registry.builder(b"Address"),
            _ => None,
        }
    }

    fn receive(&mut self, key: &[u8], value: Built) -> kat_bind::Result<()> {
        match key {
            b"roles" => {
                let roles = take::<serde_json::Value>(value).map_err(|_| Error::Mismatch("roles"))?;
                self.roles = roles
                    .as_array()
                    .into_iter()
                    .flatten()
                    .filter_map(|role| role.as_str().map(str::to_string))
                    .collect();
            }
            b"home" => {
                self.home = Some(take::<Address>(value).map_err(|_| Error::Mismatch("Address"))?);
            }
            _ => {}
        }
        Ok(())
    }
}

impl Record for Address {
    fn accept(&mut self, _tag: &Chain, key: &Chain, value: &Chain) -> kat_bind::Result<()> {
        if key == "city" {
            self.city = value.to_string();
        }
        Ok(())
    }
}

fn registry() -> Arc<Registry> {
    let mut registry = Registry::standard();
    registry
        .register_record::<User>("User")
        .register_record::<Address>("Address");
    Arc::new(registry)
}

#[rstest::rstest]
fn decodes_user_record() {
    let user: User = from_slice(Format::Kat, b"User{i:id(1)s:name(kraity)}", &registry()).unwrap();
    assert_eq!(user.id, 1);
    assert_eq!(user.name, "kraity");
}

#[rstest::rstest]
fn decodes_nested_records_and_skips_unknown_fields() {
    let input = b"User{
        i:id(7)
        M:extra{ s:x(}{) M{ s:deep(1) } }
        L:roles{ s(admin) s(dev) }
        Address:home{ s:city(Paris) }
        s:name(kraity)
    }";
    let user: User = from_slice(Format::Kat, input, &registry()).unwrap();
    assert_eq!(
        user,
        User {
            id: 7,
            name: "kraity".to_string(),
            roles: vec!["admin".to_string(), "dev".to_string()],
            home: Some(Address {
                city: "Paris".to_string()
            }),
        }
    );
}

#[rstest::rstest]
fn record_field_parse_failure_is_reported() {
    let err = from_slice::<User>(Format::Kat, b"User{i:id(one)}", &registry()).unwrap_err();
    assert!(matches!(err, Error::Mismatch("i64")));
}

#[rstest::rstest]
fn escapes_decode_to_utf8() {
    let value = to_value(
        Format::Kat,
        b"M{s:a(^u0041)s:b(^uD83E^uDDEC)s:c(^uD83E)s:d(x^ny)}",
    )
    .unwrap();
    assert_eq!(value, json!({"a": "A", "b": "\u{1F9EC}", "c": "?", "d": "x\ny"}));
}

#[rstest::rstest]
fn extra_closing_brace_is_structural() {
    let err = to_value(Format::Kat, b"User{i:id(1)}}").unwrap_err();
    assert!(err.is_structural(), "{err}");
}

#[rstest::rstest]
fn stray_paren_in_skipped_field_is_structural() {
    let err = from_slice::<User>(Format::Kat, b"User{ M:extra{ s:x(1)) } i:id(1) }", &registry())
        .unwrap_err();
    assert!(err.is_structural(), "{err}");
}

#[rstest::rstest]
fn wrong_target_type_is_a_mismatch() {
    let err = from_slice::<String>(Format::Kat, b"M{s:a(1)}", &registry()).unwrap_err();
    assert!(matches!(err, Error::Mismatch(_)));
}

#[rstest::rstest]
fn declined_root_yields_empty() {
    let err = from_slice::<serde_json::Value>(Format::Kat, b"Unknown{s:a(1)}", &Arc::new(Registry::new()))
        .unwrap_err();
    assert!(matches!(err, Error::Empty));
}
