// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Rewrites well-known resource attribute names into the metadata keys Sumo Logic expects.

use crate::record::Attributes;

/// Attribute names and the metadata key each one is promoted to.
pub const ATTRIBUTE_TRANSLATIONS: [(&str, &str); 10] = [
    ("cloud.account.id", "AccountId"),
    ("cloud.availability_zone", "AvailabilityZone"),
    ("cloud.region", "Region"),
    ("host.id", "InstanceId"),
    ("host.name", "host"),
    ("host.type", "InstanceType"),
    ("k8s.cluster.name", "Cluster"),
    ("k8s.deployment.name", "Deployment"),
    ("k8s.namespace.name", "Namespace"),
    ("k8s.pod.name", "pod"),
];

/// Renames every translatable attribute in place.
///
/// A translation is skipped when the destination key is already present, in which case both
/// the source and the destination attributes are left as they are.
pub fn translate_attributes(attributes: &mut Attributes) {
    for (old_key, new_key) in ATTRIBUTE_TRANSLATIONS {
        if attributes.contains_key(new_key) {
            continue;
        }
        if let Some(value) = attributes.remove(old_key) {
            attributes.upsert(new_key, value);
        }
    }
}

/// Rewrites `%{attribute}` placeholders in a configured template so that they reference the
/// translated key names. Placeholders that are not in the translation table are left alone.
#[must_use]
pub fn translate_config_value(value: &str) -> String {
    let mut translated = value.to_string();
    for (old_key, new_key) in ATTRIBUTE_TRANSLATIONS {
        translated = translated.replace(&format!("%{{{old_key}}}"), &format!("%{{{new_key}}}"));
    }
    translated
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::AttributeValue;
    use proptest::prelude::*;

    fn assert_attribute(attributes: &Attributes, key: &str, expected: Option<&str>) {
        assert_eq!(
            attributes.get(key),
            expected.map(AttributeValue::from).as_ref(),
            "unexpected value for {key}"
        );
    }

    #[test]
    fn test_translate_attributes() {
        let mut attributes: Attributes = [
            ("host.name", "testing-host"),
            ("host.id", "my-host-id"),
            ("host.type", "my-host-type"),
            ("k8s.cluster.name", "testing-cluster"),
            ("k8s.deployment.name", "my-deployment-name"),
            ("k8s.namespace.name", "my-namespace-name"),
            ("cloud.account.id", "my-account-id"),
            ("cloud.availability_zone", "my-zone"),
            ("cloud.region", "my-region"),
        ]
        .into_iter()
        .collect();
        assert_eq!(attributes.len(), 9);

        translate_attributes(&mut attributes);

        assert_eq!(attributes.len(), 9);
        assert_attribute(&attributes, "host", Some("testing-host"));
        assert_attribute(&attributes, "host.name", None);
        assert_attribute(&attributes, "AccountId", Some("my-account-id"));
        assert_attribute(&attributes, "cloud.account.id", None);
        assert_attribute(&attributes, "AvailabilityZone", Some("my-zone"));
        assert_attribute(&attributes, "cloud.availability_zone", None);
        assert_attribute(&attributes, "Region", Some("my-region"));
        assert_attribute(&attributes, "cloud.region", None);
        assert_attribute(&attributes, "InstanceId", Some("my-host-id"));
        assert_attribute(&attributes, "host.id", None);
        assert_attribute(&attributes, "InstanceType", Some("my-host-type"));
        assert_attribute(&attributes, "host.type", None);
        assert_attribute(&attributes, "Cluster", Some("testing-cluster"));
        assert_attribute(&attributes, "k8s.cluster.name", None);
        assert_attribute(&attributes, "Deployment", Some("my-deployment-name"));
        assert_attribute(&attributes, "k8s.deployment.name", None);
        assert_attribute(&attributes, "Namespace", Some("my-namespace-name"));
        assert_attribute(&attributes, "k8s.namespace.name", None);
    }

    #[test]
    fn test_translate_attributes_does_nothing_when_attribute_does_not_exist() {
        let mut attributes = Attributes::new();
        translate_attributes(&mut attributes);
        assert!(attributes.is_empty());
        assert_attribute(&attributes, "host", None);
    }

    #[test]
    fn test_translate_attributes_leaves_other_attributes_unchanged() {
        let mut attributes: Attributes = [("one", "one1"), ("host.name", "host1"), ("three", "three1")]
            .into_iter()
            .collect();

        translate_attributes(&mut attributes);

        assert_eq!(attributes.len(), 3);
        assert_attribute(&attributes, "one", Some("one1"));
        assert_attribute(&attributes, "host", Some("host1"));
        assert_attribute(&attributes, "three", Some("three1"));
    }

    #[test]
    fn test_translate_attributes_single_entry() {
        let mut attributes: Attributes = [("host.name", "h")].into_iter().collect();
        translate_attributes(&mut attributes);
        assert_eq!(attributes, [("host", "h")].into_iter().collect());
    }

    #[test]
    fn test_translate_attributes_does_not_overwrite_existing_attribute() {
        let mut attributes: Attributes = [("host", "h1"), ("host.name", "h2")].into_iter().collect();
        let before = attributes.clone();

        translate_attributes(&mut attributes);

        assert_eq!(attributes, before);
        assert_attribute(&attributes, "host", Some("h1"));
        assert_attribute(&attributes, "host.name", Some("h2"));
    }

    #[test]
    fn test_translate_config_value() {
        assert_eq!(
            translate_config_value("%{k8s.pod.name}-%{host.name}/%{pod}-%{custom.key}"),
            "%{pod}-%{host}/%{pod}-%{custom.key}"
        );
    }

    #[test]
    fn test_translate_config_value_without_placeholders() {
        assert_eq!(translate_config_value("host.name"), "host.name");
    }

    fn arb_attributes() -> impl Strategy<Value = Attributes> {
        let keys = prop::sample::select(vec![
            "host", "host.name", "host.id", "InstanceId", "cloud.region", "Region", "pod",
            "k8s.pod.name", "other", "k8s.cluster.name",
        ]);
        prop::collection::vec((keys, "[a-z]{1,6}"), 0..10)
            .prop_map(|pairs| pairs.into_iter().collect())
    }

    proptest! {
        #[test]
        fn translation_is_idempotent(attributes in arb_attributes()) {
            let mut once = attributes.clone();
            translate_attributes(&mut once);
            let mut twice = once.clone();
            translate_attributes(&mut twice);
            prop_assert_eq!(once, twice);
        }

        #[test]
        fn translation_keeps_count_and_existing_values(attributes in arb_attributes()) {
            let mut translated = attributes.clone();
            translate_attributes(&mut translated);
            prop_assert_eq!(translated.len(), attributes.len());
            for (_, new_key) in ATTRIBUTE_TRANSLATIONS {
                if let Some(value) = attributes.get(new_key) {
                    prop_assert_eq!(translated.get(new_key), Some(value));
                }
            }
        }
    }
}
