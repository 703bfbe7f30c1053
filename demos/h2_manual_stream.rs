use riphttplib::h2::connection::{H2Connection, StreamEvent};
use riphttplib::types::{ClientTimeouts, Header, Request};
use riphttplib::utils::{ensure_user_agent, merge_headers, prepare_pseudo_headers};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let target_url = "https://httpbin.org/get";

    let connection = H2Connection::connect(target_url, &ClientTimeouts::default()).await?;
    let stream_id = connection.create_stream().await?;

    let request =
        Request::new(target_url, "GET")?.with_header(Header::new("accept".into(), "text/plain".into()));
    let mut headers = merge_headers(prepare_pseudo_headers(&request)?, &request);
    ensure_user_agent(&mut headers);

    connection.send_headers(stream_id, &headers, true).await?;

    let mut body = Vec::new();
    loop {
        match connection.recv_stream_event(stream_id).await? {
            StreamEvent::Headers { end_stream, .. } if end_stream => break,
            StreamEvent::Headers { .. } => {}
            StreamEvent::Data { payload, end_stream } => {
                body.extend_from_slice(&payload);
                if end_stream {
                    break;
                }
            }
            StreamEvent::RstStream { error_code } => {
                eprintln!("stream reset: {:?}", error_code);
                break;
            }
        }
    }

    println!("{}", String::from_utf8_lossy(&body));
    Ok(())
}
