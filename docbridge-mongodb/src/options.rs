//! Translation of merged connect options into a driver connection string.
//!
//! The adapter carries options under the names users configure them with, including a
//! legacy family the current driver no longer understands. Only options the driver
//! accepts as URI options are forwarded, under their canonical spelling; everything else
//! is dropped with a debug event.

use bson::Bson;

use docbridge_core::config::{OptionMap, percent_encode};

/// URI options understood by the driver, in their canonical spelling.
const URI_OPTIONS: &[&str] = &[
    "appName",
    "authMechanism",
    "authMechanismProperties",
    "authSource",
    "compressors",
    "connectTimeoutMS",
    "directConnection",
    "heartbeatFrequencyMS",
    "journal",
    "loadBalanced",
    "localThresholdMS",
    "maxConnecting",
    "maxIdleTimeMS",
    "maxPoolSize",
    "maxStalenessSeconds",
    "minPoolSize",
    "readConcernLevel",
    "readPreference",
    "readPreferenceTags",
    "replicaSet",
    "retryReads",
    "retryWrites",
    "serverSelectionTimeoutMS",
    "socketTimeoutMS",
    "srvMaxHosts",
    "srvServiceName",
    "ssl",
    "tls",
    "tlsAllowInvalidCertificates",
    "tlsAllowInvalidHostnames",
    "tlsCAFile",
    "tlsCertificateKeyFile",
    "tlsCertificateKeyFilePassword",
    "tlsInsecure",
    "w",
    "wTimeoutMS",
    "zlibCompressionLevel",
];

/// Options accepted under an older name.
const RENAMED_OPTIONS: &[(&str, &str)] = &[
    ("poolSize", "maxPoolSize"),
    ("wtimeout", "wTimeoutMS"),
];

fn canonical_name(name: &str) -> Option<&'static str> {
    RENAMED_OPTIONS
        .iter()
        .find(|(legacy, _)| legacy.eq_ignore_ascii_case(name))
        .map(|(_, canonical)| *canonical)
        .or_else(|| {
            URI_OPTIONS
                .iter()
                .find(|option| option.eq_ignore_ascii_case(name))
                .copied()
        })
}

fn uri_value(value: &Bson) -> Option<String> {
    match value {
        Bson::String(value) => Some(percent_encode(value)),
        Bson::Boolean(value) => Some(value.to_string()),
        Bson::Int32(value) => Some(value.to_string()),
        Bson::Int64(value) => Some(value.to_string()),
        Bson::Double(value) if value.fract() == 0.0 => Some((*value as i64).to_string()),
        Bson::Double(value) => Some(value.to_string()),
        _ => None,
    }
}

/// Builds the URI query component for the options the driver understands.
///
/// An array value is emitted as one `name=value` pair per element, in order.
pub(crate) fn uri_query(options: &OptionMap) -> String {
    let mut pairs = Vec::new();

    for (name, value) in options {
        let Some(canonical) = canonical_name(name) else {
            tracing::debug!(option = %name, "Skipping option not understood by the driver");
            continue;
        };

        let values = match value {
            Bson::Array(values) => values.iter().collect::<Vec<_>>(),
            value => vec![value],
        };

        for value in values {
            match uri_value(value) {
                Some(value) => pairs.push(format!("{}={}", canonical, value)),
                None => tracing::debug!(option = %name, "Skipping option with a non-scalar value"),
            }
        }
    }

    pairs.join("&")
}

/// Appends the forwarded options to a connection string without a query component.
pub(crate) fn connection_uri(connection_string: &str, options: &OptionMap) -> String {
    let query = uri_query(options);
    if query.is_empty() {
        return connection_string.to_string();
    }

    let mut uri = connection_string.to_string();
    let authority_start = uri.find("://").map(|at| at + 3).unwrap_or(0);
    if !uri[authority_start..].contains('/') {
        uri.push('/');
    }

    uri.push('?');
    uri.push_str(&query);
    uri
}
