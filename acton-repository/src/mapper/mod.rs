//! Field mapping between entities and transport objects
//!
//! A [`FieldMapper`] converts a source type into a destination type. Every
//! destination member follows the same-name convention unless a
//! [`MappingRule`] overrides it:
//!
//! - **Convention**: copy the source member with the same name when the
//!   destination type accepts its value; otherwise keep the destination value
//! - **Rename**: copy a differently named source member
//! - **Computed**: derive the value from the whole source
//! - **Ignore**: never touch the member
//!
//! Both types go through their `serde` representation, so member names are the
//! serialized names. Destination members are the ones `D` serializes plus the
//! ones its `Deserialize` impl declares, so members skipped while serializing
//! (`skip_serializing_if`) still take part. Rules are checked against those
//! members once, when the mapper is built.
//!
//! # Example
//!
//! ```rust
//! use acton_repository::mapper::{FieldMapper, Mapper};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Serialize)]
//! struct Account {
//!     id: i64,
//!     login: String,
//!     email: String,
//! }
//!
//! #[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
//! struct AccountView {
//!     name: String,
//!     email: String,
//!     shouting: String,
//! }
//!
//! let mapper = FieldMapper::<Account, AccountView>::builder()
//!     .rename("name", "login")
//!     .compute("shouting", |a: &Account| a.login.to_uppercase())
//!     .build()
//!     .unwrap();
//!
//! let account = Account { id: 1, login: "ada".into(), email: "ada@example.com".into() };
//! let view = mapper.map(&account).unwrap();
//! assert_eq!(view.name, "ada");
//! assert_eq!(view.email, "ada@example.com");
//! assert_eq!(view.shouting, "ADA");
//! ```

mod error;
mod rule;

use std::collections::HashSet;
use std::fmt;
use std::marker::PhantomData;

use serde::de::{self, DeserializeOwned, Deserializer, Visitor};
use serde::Serialize;
use serde_json::{Map, Value};

pub use error::{MappingError, MappingResult};
pub use rule::MappingRule;

use rule::MemberPlan;

/// Conversion from `S` to `D`
pub trait Mapper<S, D>: Send + Sync {
    /// Build a new destination from `source`
    fn map(&self, source: &S) -> MappingResult<D>;

    /// Overwrite `destination` from `source` and hand it back
    fn map_into<'d>(&self, source: &S, destination: &'d mut D) -> MappingResult<&'d mut D>;

    /// `None` maps to `None`
    fn map_option(&self, source: Option<&S>) -> MappingResult<Option<D>> {
        source.map(|source| self.map(source)).transpose()
    }

    /// Map every element, preserving order and length
    fn map_list(&self, sources: &[S]) -> MappingResult<Vec<D>> {
        sources.iter().map(|source| self.map(source)).collect()
    }
}

/// Convention-plus-overrides mapper, compiled once by [`FieldMapperBuilder`]
pub struct FieldMapper<S, D> {
    plan: Vec<(String, MemberPlan<S>)>,
    _types: PhantomData<fn(&S) -> D>,
}

impl<S, D> FieldMapper<S, D>
where
    S: Serialize,
    D: Serialize + DeserializeOwned + Default,
{
    /// Start describing a mapper
    pub fn builder() -> FieldMapperBuilder<S, D> {
        FieldMapperBuilder {
            rules: Vec::new(),
            _types: PhantomData,
        }
    }

    /// Mapper using the same-name convention for every member
    ///
    /// # Errors
    ///
    /// Fails when `D` does not serialize to a map of named members.
    pub fn convention() -> MappingResult<Self> {
        Self::builder().build()
    }

    fn translate(&self, source: &S, destination: &mut D) -> MappingResult<()> {
        let fields = members_of(source)?;
        let mut merged = members_of(&*destination)?;
        let mut candidates = Vec::new();

        for (member, plan) in &self.plan {
            let Some(value) = plan.resolve(member, source, &fields)? else {
                continue;
            };
            if plan.is_convention() {
                candidates.push((member, value));
            } else {
                merged.insert(member.clone(), value);
            }
        }

        let mut optimistic = merged.clone();
        for (member, value) in &candidates {
            optimistic.insert((*member).clone(), value.clone());
        }
        if let Ok(mapped) = serde_json::from_value(Value::Object(optimistic)) {
            *destination = mapped;
            return Ok(());
        }

        // Some same-name value does not fit; admit candidates one at a time
        for (member, value) in candidates {
            let previous = merged.insert(member.clone(), value);
            if serde_json::from_value::<D>(Value::Object(merged.clone())).is_err() {
                match previous {
                    Some(previous) => merged.insert(member.clone(), previous),
                    None => merged.remove(member),
                };
                tracing::trace!(
                    member = member.as_str(),
                    destination = std::any::type_name::<D>(),
                    "Kept destination value for incompatible same-name member"
                );
            }
        }

        *destination = serde_json::from_value(Value::Object(merged))?;
        Ok(())
    }
}

impl<S, D> Mapper<S, D> for FieldMapper<S, D>
where
    S: Serialize,
    D: Serialize + DeserializeOwned + Default,
{
    fn map(&self, source: &S) -> MappingResult<D> {
        let mut destination = D::default();
        self.translate(source, &mut destination)?;
        Ok(destination)
    }

    fn map_into<'d>(&self, source: &S, destination: &'d mut D) -> MappingResult<&'d mut D> {
        self.translate(source, destination)?;
        Ok(destination)
    }
}

impl<S, D> fmt::Debug for FieldMapper<S, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldMapper")
            .field("source", &std::any::type_name::<S>())
            .field("destination", &std::any::type_name::<D>())
            .field("plan", &self.plan)
            .finish()
    }
}

/// Collects override rules for a [`FieldMapper`]
pub struct FieldMapperBuilder<S, D> {
    rules: Vec<(String, MappingRule<S>)>,
    _types: PhantomData<fn(&S) -> D>,
}

impl<S, D> FieldMapperBuilder<S, D>
where
    S: Serialize,
    D: Serialize + DeserializeOwned + Default,
{
    /// Attach an explicit rule to a destination member
    #[must_use]
    pub fn rule(mut self, member: impl Into<String>, rule: MappingRule<S>) -> Self {
        self.rules.push((member.into(), rule));
        self
    }

    /// Fill `member` from the source member named `source`
    #[must_use]
    pub fn rename(self, member: impl Into<String>, source: impl Into<String>) -> Self {
        self.rule(member, MappingRule::rename(source))
    }

    /// Fill `member` with a value derived from the source
    #[must_use]
    pub fn compute<T, F>(self, member: impl Into<String>, compute: F) -> Self
    where
        T: Serialize,
        F: Fn(&S) -> T + Send + Sync + 'static,
    {
        self.rule(member, MappingRule::computed(compute))
    }

    /// Never write `member`
    #[must_use]
    pub fn ignore(self, member: impl Into<String>) -> Self {
        self.rule(member, MappingRule::Ignore)
    }

    /// Compile the rule set against the members of `D`
    ///
    /// # Errors
    ///
    /// Fails when `D` does not serialize to a map of named members. Also fails
    /// when a rule targets a member `D` neither serializes nor declares, or
    /// one that already has a rule.
    pub fn build(self) -> MappingResult<FieldMapper<S, D>> {
        let mut members: Vec<String> = members_of(&D::default())?
            .into_iter()
            .map(|(member, _)| member)
            .collect();
        for declared in declared_members::<D>() {
            if !members.iter().any(|member| member == declared) {
                members.push(declared.to_string());
            }
        }
        let type_name = std::any::type_name::<D>();

        let mut seen = HashSet::new();
        for (member, _) in &self.rules {
            if !members.contains(member) {
                return Err(MappingError::UnknownMember {
                    type_name,
                    member: member.clone(),
                });
            }
            if !seen.insert(member.as_str()) {
                return Err(MappingError::DuplicateRule {
                    member: member.clone(),
                });
            }
        }

        let mut rules = self.rules;
        let plan = members
            .into_iter()
            .map(|member| {
                let entry = match rules.iter().position(|(target, _)| *target == member) {
                    Some(index) => MemberPlan::Rule(rules.swap_remove(index).1),
                    None => MemberPlan::Convention,
                };
                (member, entry)
            })
            .collect();

        tracing::trace!(
            source = std::any::type_name::<S>(),
            destination = type_name,
            "Compiled field mapper"
        );

        Ok(FieldMapper {
            plan,
            _types: PhantomData,
        })
    }
}

fn members_of<T: Serialize>(value: &T) -> MappingResult<Map<String, Value>> {
    match serde_json::to_value(value)? {
        Value::Object(members) => Ok(members),
        _ => Err(MappingError::NotAStruct {
            type_name: std::any::type_name::<T>(),
        }),
    }
}

/// Member names `D` declares to its deserializer
///
/// Derived `Deserialize` impls hand their field list to `deserialize_struct`;
/// anything else (maps, flattened structs) declares nothing.
fn declared_members<D: DeserializeOwned>() -> Vec<&'static str> {
    let mut names = Vec::new();
    let _ = D::deserialize(MemberNames { names: &mut names });
    names
}

struct MemberNames<'a> {
    names: &'a mut Vec<&'static str>,
}

impl<'de> Deserializer<'de> for MemberNames<'_> {
    type Error = de::value::Error;

    fn deserialize_any<V: Visitor<'de>>(self, _visitor: V) -> Result<V::Value, Self::Error> {
        Err(de::Error::custom("not a struct"))
    }

    fn deserialize_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        fields: &'static [&'static str],
        _visitor: V,
    ) -> Result<V::Value, Self::Error> {
        self.names.extend_from_slice(fields);
        Err(de::Error::custom("member names collected"))
    }

    serde::forward_to_deserialize_any! {
        bool i8 i16 i32 i64 i128 u8 u16 u32 u64 u128 f32 f64 char str string
        bytes byte_buf option unit unit_struct newtype_struct seq tuple
        tuple_struct map enum identifier ignored_any
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::fixtures::{user_1, user_2, user_3, User, NAME_DEV_4, UUID_DEV_1, UUID_DEV_2, UUID_DEV_3};
    use serde::Deserialize;
    use uuid::Uuid;

    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    struct UserDto {
        id: Uuid,
        name: String,
        email: String,
        active: bool,
        nickname: Option<String>,
    }

    fn dto(user: &User) -> UserDto {
        UserDto {
            id: user.uuid,
            name: user.name.clone(),
            email: user.email.clone(),
            active: user.active,
            nickname: None,
        }
    }

    fn user_to_dto() -> FieldMapper<User, UserDto> {
        FieldMapper::builder()
            .compute("id", |user: &User| user.uuid)
            .rename("name", "name")
            .build()
            .unwrap()
    }

    #[test]
    fn test_map_option_none() {
        assert_eq!(user_to_dto().map_option(None).unwrap(), None);
    }

    #[test]
    fn test_map_entity_to_dto() {
        let actual = user_to_dto().map(&user_1()).unwrap();
        assert_eq!(actual, dto(&user_1()));
        assert_eq!(actual.id, UUID_DEV_1);
    }

    #[test]
    fn test_map_into_overwrites_existing() {
        let mapper = user_to_dto();
        let mut existing = dto(&user_2());

        let returned = mapper.map_into(&user_1(), &mut existing).unwrap();
        returned.active = false;

        assert_eq!(existing.id, UUID_DEV_1);
        assert_eq!(existing.name, user_1().name);
        assert!(!existing.active);
    }

    #[test]
    fn test_map_list_preserves_order() {
        let mapper = user_to_dto();

        let mapped = mapper.map_list(&[user_3(), user_1(), user_2()]).unwrap();
        let ids: Vec<Uuid> = mapped.iter().map(|d| d.id).collect();
        assert_eq!(ids, vec![UUID_DEV_3, UUID_DEV_1, UUID_DEV_2]);

        assert!(mapper.map_list(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_convention_only_mapper() {
        let mapper = FieldMapper::<UserDto, UserDto>::convention().unwrap();
        let mut source = dto(&user_1());
        source.nickname = Some("one".to_string());

        assert_eq!(mapper.map(&source).unwrap(), source);
    }

    #[test]
    fn test_override_applies_to_its_member_only() {
        let mapper = FieldMapper::<User, UserDto>::builder()
            .compute("name", |_: &User| NAME_DEV_4)
            .build()
            .unwrap();

        let actual = mapper.map(&user_1()).unwrap();
        assert_eq!(actual.name, NAME_DEV_4);
        assert_eq!(actual.email, user_1().email);
    }

    #[test]
    fn test_incompatible_types_keep_default() {
        // `User::id` is a number, `UserDto::id` a uuid string
        let mapper = FieldMapper::<User, UserDto>::convention().unwrap();

        let actual = mapper.map(&user_1()).unwrap();
        assert_eq!(actual.id, Uuid::nil());
        assert_eq!(actual.name, user_1().name);
    }

    #[test]
    fn test_ignore_keeps_existing_value() {
        let mapper = FieldMapper::<User, UserDto>::builder()
            .compute("id", |user: &User| user.uuid)
            .ignore("email")
            .build()
            .unwrap();
        let mut existing = dto(&user_2());

        mapper.map_into(&user_1(), &mut existing).unwrap();
        assert_eq!(existing.email, user_2().email);
        assert_eq!(existing.id, UUID_DEV_1);
    }

    #[test]
    fn test_unknown_member_rejected_at_build() {
        let result = FieldMapper::<User, UserDto>::builder()
            .rename("full_name", "name")
            .build();

        assert!(matches!(
            result,
            Err(MappingError::UnknownMember { ref member, .. }) if member == "full_name"
        ));
    }

    #[test]
    fn test_duplicate_rule_rejected_at_build() {
        let result = FieldMapper::<User, UserDto>::builder()
            .ignore("email")
            .rename("email", "name")
            .build();

        assert!(matches!(result, Err(MappingError::DuplicateRule { .. })));
    }

    #[test]
    fn test_non_struct_destination_rejected() {
        let result = FieldMapper::<User, Vec<String>>::convention();
        assert!(matches!(result, Err(MappingError::NotAStruct { .. })));
    }

    #[test]
    fn test_rename_missing_source_member() {
        let mapper = FieldMapper::<User, UserDto>::builder()
            .rename("nickname", "alias")
            .build()
            .unwrap();

        assert!(matches!(
            mapper.map(&user_1()),
            Err(MappingError::MissingSource { .. })
        ));
    }

    #[derive(Serialize)]
    struct Reading {
        name: String,
        score: f64,
        code: String,
        nick: String,
    }

    #[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
    struct WholeScore {
        name: String,
        score: i64,
    }

    #[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
    struct NumericCode {
        name: String,
        code: Option<u32>,
    }

    #[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
    struct Sparse {
        name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        nick: Option<String>,
    }

    fn reading() -> Reading {
        Reading {
            name: "gauge".to_string(),
            score: 1.5,
            code: "x".to_string(),
            nick: "n".to_string(),
        }
    }

    #[test]
    fn test_fractional_number_keeps_integer_default() {
        let mapper = FieldMapper::<Reading, WholeScore>::convention().unwrap();

        let actual = mapper.map(&reading()).unwrap();
        assert_eq!(actual, WholeScore { name: "gauge".to_string(), score: 0 });
    }

    #[test]
    fn test_wrong_typed_optional_member_keeps_default() {
        let mapper = FieldMapper::<Reading, NumericCode>::convention().unwrap();

        let actual = mapper.map(&reading()).unwrap();
        assert_eq!(actual, NumericCode { name: "gauge".to_string(), code: None });

        let mut existing = NumericCode { name: String::new(), code: Some(7) };
        mapper.map_into(&reading(), &mut existing).unwrap();
        assert_eq!(existing.code, Some(7));
        assert_eq!(existing.name, "gauge");
    }

    #[test]
    fn test_incompatible_member_does_not_fail_list() {
        let mapper = FieldMapper::<Reading, WholeScore>::convention().unwrap();

        let mapped = mapper.map_list(&[reading(), reading()]).unwrap();
        assert_eq!(mapped.len(), 2);
        assert!(mapped.iter().all(|m| m.name == "gauge" && m.score == 0));
    }

    #[test]
    fn test_member_skipped_when_serializing_maps_by_convention() {
        let mapper = FieldMapper::<Reading, Sparse>::convention().unwrap();

        let actual = mapper.map(&reading()).unwrap();
        assert_eq!(actual.nick.as_deref(), Some("n"));
        assert_eq!(actual.name, "gauge");
    }

    #[test]
    fn test_rule_on_member_skipped_when_serializing() {
        let mapper = FieldMapper::<Reading, Sparse>::builder()
            .rename("nick", "name")
            .build()
            .unwrap();

        let actual = mapper.map(&reading()).unwrap();
        assert_eq!(actual.nick.as_deref(), Some("gauge"));
    }

    #[test]
    fn test_declared_members_of_struct() {
        assert_eq!(declared_members::<Sparse>(), vec!["name", "nick"]);
        assert!(declared_members::<Vec<String>>().is_empty());
    }

    #[test]
    fn test_mapper_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<FieldMapper<User, UserDto>>();
    }
}
