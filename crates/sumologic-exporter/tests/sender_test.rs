// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use flate2::read::{DeflateDecoder, GzDecoder};
use mockito::{Matcher, Server};
use std::io::Read;
use sumologic_exporter::{
    config::Config,
    errors::SendError,
    fields::Fields,
    format::otlp,
    record::{
        AttributeValue, Attributes, LogRecord, MetricKind, MetricRecord, MetricValue, SpanKind,
        SpanRecord,
    },
    sender::Sender,
    source_format::SourceValues,
};

fn config(endpoint: String) -> Config {
    Config {
        endpoint,
        compress_encoding: String::new(),
        log_format: "text".to_string(),
        metric_format: "prometheus".to_string(),
        ..Default::default()
    }
}

fn example_logs() -> Vec<LogRecord> {
    vec![
        LogRecord::new("Example log")
            .with_attribute("key1", "value1")
            .with_attribute("key2", "value2"),
        LogRecord::new("Another example log")
            .with_attribute("key1", "value1")
            .with_attribute("key2", "value2"),
    ]
}

fn example_metrics() -> Vec<MetricRecord> {
    vec![
        MetricRecord::new("test.metric.data", MetricKind::Counter, MetricValue::Int(14500))
            .with_unit("bytes")
            .with_timestamp(1_605_534_165_000_000_000)
            .with_attribute("test", "test_value")
            .with_attribute("test2", "second_value"),
        MetricRecord::new("gauge_metric_name", MetricKind::Gauge, MetricValue::Int(124))
            .with_timestamp(1_608_124_661_166_000_000)
            .with_attribute("foo", "bar"),
    ]
}

fn fields() -> Fields {
    [("key1", "value"), ("key2", "value2")].into_iter().collect()
}

#[tokio::test]
async fn test_send_logs_text() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/")
        .match_header("X-Sumo-Client", "otelcol")
        .match_header("Content-Type", "application/x-www-form-urlencoded")
        .match_header("X-Sumo-Fields", "key1=value, key2=value2")
        .match_header("Content-Encoding", Matcher::Missing)
        .match_body("Example log\nAnother example log")
        .with_status(200)
        .expect(1)
        .create_async()
        .await;

    let sender = Sender::new(&config(server.url())).expect("failed to create sender");
    let result = sender.send_logs(&example_logs(), &fields()).await;

    assert!(result.is_ok());
    mock.assert_async().await;
}

#[tokio::test]
async fn test_send_logs_without_fields_omits_header() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/")
        .match_header("X-Sumo-Fields", Matcher::Missing)
        .match_header("X-Sumo-Name", Matcher::Missing)
        .with_status(200)
        .expect(1)
        .create_async()
        .await;

    let sender = Sender::new(&config(server.url())).expect("failed to create sender");
    assert!(sender.send_logs(&example_logs(), &Fields::new()).await.is_ok());
    mock.assert_async().await;
}

#[tokio::test]
async fn test_send_logs_json_multitype() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/")
        .match_body(
            "{\"key1\":\"value1\",\"key2\":\"value2\",\"log\":{\"lk1\":\"lv1\",\"lk2\":13}}\n\
             {\"key1\":\"value1\",\"key2\":\"value2\",\"log\":[\"lv2\",13]}",
        )
        .with_status(200)
        .expect(1)
        .create_async()
        .await;

    let mut map = Attributes::new();
    map.insert("lk1", "lv1");
    map.insert("lk2", 13_i64);
    let records = vec![
        LogRecord::new(map)
            .with_attribute("key1", "value1")
            .with_attribute("key2", "value2"),
        LogRecord::new(AttributeValue::Array(vec!["lv2".into(), 13_i64.into()]))
            .with_attribute("key1", "value1")
            .with_attribute("key2", "value2"),
    ];

    let sender = Sender::new(&Config {
        log_format: "json".to_string(),
        ..config(server.url())
    })
    .expect("failed to create sender");
    assert!(sender.send_logs(&records, &fields()).await.is_ok());
    mock.assert_async().await;
}

#[tokio::test]
async fn test_send_logs_split() {
    let mut server = Server::new_async().await;
    let first = server
        .mock("POST", "/")
        .match_body("Example log")
        .with_status(200)
        .expect(1)
        .create_async()
        .await;
    let second = server
        .mock("POST", "/")
        .match_body("Another example log")
        .with_status(200)
        .expect(1)
        .create_async()
        .await;

    let sender = Sender::new(&Config {
        max_request_body_size: 10,
        ..config(server.url())
    })
    .expect("failed to create sender");

    assert!(sender.send_logs(&example_logs(), &fields()).await.is_ok());
    first.assert_async().await;
    second.assert_async().await;
}

#[tokio::test]
async fn test_send_logs_split_failed_one() {
    let mut server = Server::new_async().await;
    let first = server
        .mock("POST", "/")
        .match_body("Example log")
        .with_status(500)
        .expect(1)
        .create_async()
        .await;
    let second = server
        .mock("POST", "/")
        .match_body("Another example log")
        .with_status(200)
        .expect(1)
        .create_async()
        .await;

    let sender = Sender::new(&Config {
        max_request_body_size: 10,
        ..config(server.url())
    })
    .expect("failed to create sender");

    let records = example_logs();
    let failure = sender
        .send_logs(&records, &fields())
        .await
        .expect_err("first request should fail");

    assert_eq!(
        failure.to_string(),
        "error during sending data: 500 Internal Server Error"
    );
    assert_eq!(failure.dropped, records[0..1]);
    first.assert_async().await;
    second.assert_async().await;
}

#[tokio::test]
async fn test_send_logs_split_failed_all() {
    let mut server = Server::new_async().await;
    let first = server
        .mock("POST", "/")
        .match_body("Example log")
        .with_status(500)
        .expect(1)
        .create_async()
        .await;
    let second = server
        .mock("POST", "/")
        .match_body("Another example log")
        .with_status(404)
        .expect(1)
        .create_async()
        .await;

    let sender = Sender::new(&Config {
        max_request_body_size: 10,
        ..config(server.url())
    })
    .expect("failed to create sender");

    let records = example_logs();
    let failure = sender
        .send_logs(&records, &fields())
        .await
        .expect_err("both requests should fail");

    assert_eq!(
        failure.to_string(),
        "[error during sending data: 500 Internal Server Error; error during sending data: 404 Not Found]"
    );
    assert_eq!(failure.dropped, records);
    first.assert_async().await;
    second.assert_async().await;
}

#[tokio::test]
async fn test_split_keeps_single_oversized_record() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/")
        .match_body("Example log")
        .with_status(200)
        .expect(1)
        .create_async()
        .await;

    let sender = Sender::new(&Config {
        max_request_body_size: 1,
        ..config(server.url())
    })
    .expect("failed to create sender");

    let records = &example_logs()[0..1];
    assert!(sender.send_logs(records, &fields()).await.is_ok());
    mock.assert_async().await;
}

#[tokio::test]
async fn test_split_three_records_first_half_is_larger() {
    let mut server = Server::new_async().await;
    let first = server
        .mock("POST", "/")
        .match_body("aaaa\nbbbb")
        .with_status(200)
        .expect(1)
        .create_async()
        .await;
    let second = server
        .mock("POST", "/")
        .match_body("cccc")
        .with_status(200)
        .expect(1)
        .create_async()
        .await;

    let sender = Sender::new(&Config {
        max_request_body_size: 10,
        ..config(server.url())
    })
    .expect("failed to create sender");

    let records = vec![
        LogRecord::new("aaaa"),
        LogRecord::new("bbbb"),
        LogRecord::new("cccc"),
    ];
    assert!(sender.send_logs(&records, &Fields::new()).await.is_ok());
    first.assert_async().await;
    second.assert_async().await;
}

#[tokio::test]
async fn test_send_logs_unsupported_format() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/")
        .expect(0)
        .create_async()
        .await;

    let sender = Sender::new(&Config {
        log_format: "carbon2".to_string(),
        ..config(server.url())
    })
    .expect("failed to create sender");

    let records = example_logs();
    let failure = sender
        .send_logs(&records, &fields())
        .await
        .expect_err("carbon2 is not a log format");

    assert!(matches!(failure.error, SendError::UnsupportedFormat { .. }));
    assert_eq!(failure.to_string(), "unsupported logs format: carbon2");
    assert_eq!(failure.dropped, records);
    mock.assert_async().await;
}

#[tokio::test]
async fn test_send_metrics_unsupported_format() {
    let sender = Sender::new(&Config {
        metric_format: "text".to_string(),
        ..config("http://localhost:1".to_string())
    })
    .expect("failed to create sender");

    let records = example_metrics();
    let failure = sender
        .send_metrics(&records, &fields())
        .await
        .expect_err("text is not a metric format");
    assert_eq!(failure.to_string(), "unsupported metrics format: text");
    assert_eq!(failure.dropped, records);
}

#[tokio::test]
async fn test_invalid_endpoint() {
    let sender = Sender::new(&config(":".to_string())).expect("failed to create sender");

    let records = example_logs();
    let failure = sender
        .send_logs(&records, &fields())
        .await
        .expect_err("endpoint is not a URL");

    assert!(matches!(failure.error, SendError::Transport(_)));
    assert_eq!(failure.dropped, records);
}

#[tokio::test]
async fn test_connection_refused() {
    let sender =
        Sender::new(&config("http://127.0.0.1:1".to_string())).expect("failed to create sender");
    let records = example_logs();
    let failure = sender
        .send_logs(&records, &fields())
        .await
        .expect_err("nothing is listening");
    assert!(matches!(failure.error, SendError::Transport(_)));
    assert_eq!(failure.dropped.len(), 2);
}

fn decoded_body_matches(
    encoding: &'static str,
    expected: &'static str,
) -> impl Fn(&mockito::Request) -> bool + Send + Sync + 'static {
    move |request| {
        let Ok(body) = request.body() else {
            return false;
        };
        let mut decoded = Vec::new();
        let read = match encoding {
            "gzip" => GzDecoder::new(body.as_slice()).read_to_end(&mut decoded).is_ok(),
            "deflate" => DeflateDecoder::new(body.as_slice())
                .read_to_end(&mut decoded)
                .is_ok(),
            "zstd" => match zstd::decode_all(body.as_slice()) {
                Ok(bytes) => {
                    decoded = bytes;
                    true
                }
                Err(_) => false,
            },
            _ => false,
        };
        read && decoded == expected.as_bytes()
    }
}

async fn assert_compressed_delivery(encoding: &'static str) {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/")
        .match_header("Content-Encoding", encoding)
        .match_request(decoded_body_matches(
            encoding,
            "Example log\nAnother example log",
        ))
        .with_status(200)
        .expect(1)
        .create_async()
        .await;

    let sender = Sender::new(&Config {
        compress_encoding: encoding.to_string(),
        ..config(server.url())
    })
    .expect("failed to create sender");

    assert!(sender.send_logs(&example_logs(), &fields()).await.is_ok());
    mock.assert_async().await;
}

#[tokio::test]
async fn test_send_compressed_gzip() {
    assert_compressed_delivery("gzip").await;
}

#[tokio::test]
async fn test_send_compressed_deflate() {
    assert_compressed_delivery("deflate").await;
}

#[tokio::test]
async fn test_send_compressed_zstd() {
    assert_compressed_delivery("zstd").await;
}

#[tokio::test]
async fn test_source_headers() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/")
        .match_header("X-Sumo-Name", "Test source name/test_name")
        .match_header("X-Sumo-Category", "Test source category/test_name")
        .match_header("X-Sumo-Host", "Test source host/undefined")
        .with_status(200)
        .expect(2)
        .create_async()
        .await;

    let sender = Sender::new(&Config {
        source_name: "Test source name/%{key1}".to_string(),
        source_category: "Test source category/%{key1}".to_string(),
        source_host: "Test source host/%{missing}".to_string(),
        max_request_body_size: 10,
        ..config(server.url())
    })
    .expect("failed to create sender");

    let fields: Fields = [("key1", "test_name")].into_iter().collect();
    assert!(sender.send_logs(&example_logs(), &fields).await.is_ok());
    mock.assert_async().await;
}

#[tokio::test]
async fn test_client_header_override() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/")
        .match_header("X-Sumo-Client", "my-collector")
        .with_status(200)
        .expect(1)
        .create_async()
        .await;

    let sender = Sender::new(&Config {
        client: "my-collector".to_string(),
        ..config(server.url())
    })
    .expect("failed to create sender");

    assert!(sender.send_logs(&example_logs(), &fields()).await.is_ok());
    mock.assert_async().await;
}

#[tokio::test]
async fn test_otlp_logs_embed_source_metadata() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/")
        .match_header("Content-Type", "application/x-protobuf")
        .match_header("X-Sumo-Name", Matcher::Missing)
        .match_header("X-Sumo-Fields", "key1=value, key2=value2")
        .with_status(200)
        .expect(1)
        .create_async()
        .await;

    let sender = Sender::new(&Config {
        log_format: "otlp".to_string(),
        source_name: "my-name".to_string(),
        ..config(server.url())
    })
    .expect("failed to create sender");

    assert!(sender.send_logs(&example_logs(), &fields()).await.is_ok());
    mock.assert_async().await;
}

#[tokio::test]
async fn test_send_metrics_prometheus() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/")
        .match_header("Content-Type", "application/vnd.sumologic.prometheus")
        .match_header("X-Sumo-Client", "otelcol")
        .match_body(
            "test_metric_data{test=\"test_value\",test2=\"second_value\"} 14500 1605534165000\n\
             gauge_metric_name{foo=\"bar\"} 124 1608124661166",
        )
        .with_status(200)
        .expect(1)
        .create_async()
        .await;

    let sender = Sender::new(&config(server.url())).expect("failed to create sender");
    assert!(sender.send_metrics(&example_metrics(), &fields()).await.is_ok());
    mock.assert_async().await;
}

#[tokio::test]
async fn test_send_metrics_split_failed_one() {
    let mut server = Server::new_async().await;
    let first = server
        .mock("POST", "/")
        .match_body("test_metric_data{test=\"test_value\",test2=\"second_value\"} 14500 1605534165000")
        .with_status(500)
        .expect(1)
        .create_async()
        .await;
    let second = server
        .mock("POST", "/")
        .match_body("gauge_metric_name{foo=\"bar\"} 124 1608124661166")
        .with_status(200)
        .expect(1)
        .create_async()
        .await;

    let sender = Sender::new(&Config {
        max_request_body_size: 10,
        ..config(server.url())
    })
    .expect("failed to create sender");

    let records = example_metrics();
    let failure = sender
        .send_metrics(&records, &Fields::new())
        .await
        .expect_err("first request should fail");
    assert_eq!(
        failure.to_string(),
        "error during sending data: 500 Internal Server Error"
    );
    assert_eq!(failure.dropped, records[0..1]);
    first.assert_async().await;
    second.assert_async().await;
}

#[tokio::test]
async fn test_send_metrics_carbon2() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/")
        .match_header("Content-Type", "application/vnd.sumologic.carbon2")
        .match_body(
            "test=test_value test2=second_value metric=test.metric.data unit=bytes  14500 1605534165\n\
             foo=bar metric=gauge_metric_name  124 1608124661",
        )
        .with_status(200)
        .expect(1)
        .create_async()
        .await;

    let sender = Sender::new(&Config {
        metric_format: "carbon2".to_string(),
        ..config(server.url())
    })
    .expect("failed to create sender");
    assert!(sender.send_metrics(&example_metrics(), &fields()).await.is_ok());
    mock.assert_async().await;
}

#[tokio::test]
async fn test_send_metrics_graphite() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/")
        .match_header("Content-Type", "application/vnd.sumologic.graphite")
        .match_body("test_metric_data.test_value 14500 1605534165\ngauge_metric_name. 124 1608124661")
        .with_status(200)
        .expect(1)
        .create_async()
        .await;

    let sender = Sender::new(&Config {
        metric_format: "graphite".to_string(),
        graphite_template: "%{_metric_}.%{test}".to_string(),
        ..config(server.url())
    })
    .expect("failed to create sender");
    assert!(sender.send_metrics(&example_metrics(), &fields()).await.is_ok());
    mock.assert_async().await;
}

#[tokio::test]
async fn test_metrics_endpoint_override() {
    let mut server = Server::new_async().await;
    let logs = server
        .mock("POST", "/logs")
        .with_status(200)
        .expect(1)
        .create_async()
        .await;
    let metrics = server
        .mock("POST", "/metrics")
        .with_status(200)
        .expect(1)
        .create_async()
        .await;

    let sender = Sender::new(&Config {
        logs_endpoint: format!("{}/logs", server.url()),
        metrics_endpoint: format!("{}/metrics", server.url()),
        ..config(server.url())
    })
    .expect("failed to create sender");

    assert!(sender.send_logs(&example_logs(), &fields()).await.is_ok());
    assert!(sender.send_metrics(&example_metrics(), &fields()).await.is_ok());
    logs.assert_async().await;
    metrics.assert_async().await;
}

#[tokio::test]
async fn test_send_logs_nested_split_with_non_adjacent_failures() {
    let mut server = Server::new_async().await;
    let mut mocks = Vec::new();
    for (body, status) in [
        ("aaaa", 500),
        ("bbbb", 200),
        ("cccc", 200),
        ("dddd", 404),
        ("eeee", 200),
    ] {
        let mock = server
            .mock("POST", "/")
            .match_body(body)
            .with_status(status)
            .expect(1)
            .create_async()
            .await;
        mocks.push(mock);
    }

    let sender = Sender::new(&Config {
        max_request_body_size: 4,
        ..config(server.url())
    })
    .expect("failed to create sender");

    // [a b c d e] -> [a b c] [d e] -> [a b] [c] [d] [e] -> [a] [b] [c] [d] [e]
    let records: Vec<LogRecord> = ["aaaa", "bbbb", "cccc", "dddd", "eeee"]
        .into_iter()
        .map(LogRecord::new)
        .collect();
    let failure = sender
        .send_logs(&records, &Fields::new())
        .await
        .expect_err("first and fourth requests should fail");

    assert_eq!(
        failure.to_string(),
        "[error during sending data: 500 Internal Server Error; error during sending data: 404 Not Found]"
    );
    assert_eq!(failure.dropped, vec![records[0].clone(), records[3].clone()]);
    for mock in mocks {
        mock.assert_async().await;
    }
}

fn example_trace() -> Vec<SpanRecord> {
    vec![SpanRecord::new(
        [
            0x5B, 0x8E, 0xFF, 0xF7, 0x98, 0x03, 0x81, 0x03, 0xD2, 0x69, 0xB6, 0x33, 0x81, 0x3F,
            0xC6, 0x0C,
        ],
        [0xEE, 0xE1, 0x9B, 0x7E, 0xC3, 0xC1, 0xB1, 0x74],
        "operationA",
    )
    .with_kind(SpanKind::Server)
    .with_times(1_544_712_660_000_000_000, 1_544_712_661_000_000_000)
    .with_attribute("attr1", 55_i64)]
}

#[tokio::test]
async fn test_send_traces() {
    let spans = example_trace();
    let expected = otlp::traces(&spans, &SourceValues::default()).data;

    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/")
        .match_header("X-Sumo-Client", "otelcol")
        .match_header("Content-Type", "application/x-protobuf")
        .match_header("X-Sumo-Fields", Matcher::Missing)
        .match_request(move |request| {
            request
                .body()
                .map(|body| *body == expected)
                .unwrap_or(false)
        })
        .with_status(200)
        .expect(1)
        .create_async()
        .await;

    let sender = Sender::new(&config(server.url())).expect("failed to create sender");
    assert!(sender.send_traces(&spans, &Fields::new()).await.is_ok());
    mock.assert_async().await;
}

#[tokio::test]
async fn test_send_traces_to_endpoint_override() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/traces")
        .with_status(200)
        .expect(1)
        .create_async()
        .await;

    let sender = Sender::new(&Config {
        traces_endpoint: format!("{}/traces", server.url()),
        ..config(server.url())
    })
    .expect("failed to create sender");

    assert!(sender.send_traces(&example_trace(), &fields()).await.is_ok());
    mock.assert_async().await;
}

#[tokio::test]
async fn test_send_traces_unsupported_format() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/")
        .expect(0)
        .create_async()
        .await;

    let sender = Sender::new(&Config {
        trace_format: "text".to_string(),
        ..config(server.url())
    })
    .expect("failed to create sender");

    let spans = example_trace();
    let failure = sender
        .send_traces(&spans, &Fields::new())
        .await
        .expect_err("text is not a traces format");
    assert_eq!(failure.to_string(), "unsupported traces format: text");
    assert_eq!(failure.dropped, spans);
    mock.assert_async().await;
}
