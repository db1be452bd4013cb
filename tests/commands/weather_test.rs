//! `.weather` against a local fake of the OpenWeatherMap endpoint.

use steamrelay::commands::weather::Weather;
use steamrelay::commands::{CommandError, CommandHandler, Invocation, ReplyScope};

use super::support::{client, next_output, reply_sink, serve_once};

const REPORT: &str = r#"{"name":"Vancouver","sys":{"country":"CA"},
"main":{"temp":283.15,"humidity":81,"pressure":1012},
"weather":[{"description":"light rain"}]}"#;

fn weather(url: String) -> Weather {
    Weather::new(
        client(),
        url,
        Some("test-key".to_owned()),
        "vancouver".to_owned(),
    )
}

#[tokio::test]
async fn reports_current_weather_for_default_city() {
    let (url, mut requests) = serve_once("200 OK", "application/json", REPORT).await;
    let (reply, mut rx) = reply_sink();

    let result = weather(url)
        .handle(&Invocation::new(".weather", Vec::<String>::new()), &reply)
        .await;
    assert!(result.is_ok());

    let output = next_output(&mut rx).await;
    assert_eq!(
        output.text,
        "Vancouver, CA | 10.0°C | light rain | Rel. Humidity: 81% | 1012hPa"
    );
    assert_eq!(output.scope, ReplyScope::Broadcast);

    let request = requests.recv().await.unwrap_or_default();
    assert!(request.contains("q=vancouver"));
    assert!(request.contains("appid=test-key"));
}

#[tokio::test]
async fn two_word_city_is_joined() {
    let (url, mut requests) = serve_once("200 OK", "application/json", REPORT).await;
    let (reply, _rx) = reply_sink();

    let result = weather(url)
        .handle(&Invocation::new(".weather", ["new", "york", "ny"]), &reply)
        .await;
    assert!(result.is_ok());

    let request = requests.recv().await.unwrap_or_default();
    assert!(request.contains("q=new+york") || request.contains("q=new%20york"));
}

#[tokio::test]
async fn unknown_city_says_city_not_found() {
    let (url, _requests) = serve_once(
        "404 Not Found",
        "application/json",
        r#"{"cod":"404","message":"city not found"}"#,
    )
    .await;
    let (reply, _rx) = reply_sink();

    let handler = weather(url);
    let result = handler
        .handle(&Invocation::new(".weather", ["atlantis"]), &reply)
        .await;
    match result {
        Err(err @ CommandError::NotFound(_)) => {
            assert_eq!(handler.failure_message(&err), "City not found");
        }
        other => panic!("expected NotFound, got {other:?}"),
    }
}

#[tokio::test]
async fn server_error_reports_status_code() {
    let (url, _requests) = serve_once("503 Service Unavailable", "text/plain", "down").await;
    let (reply, _rx) = reply_sink();

    let handler = weather(url);
    let result = handler
        .handle(&Invocation::new(".weather", ["paris"]), &reply)
        .await;
    match result {
        Err(err @ CommandError::Status(503)) => {
            assert_eq!(handler.failure_message(&err), "Error getting weather (503)");
        }
        other => panic!("expected Status(503), got {other:?}"),
    }
}
