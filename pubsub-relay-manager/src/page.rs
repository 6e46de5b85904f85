//! HTML rendering for the index page

use bytes::Bytes;
use std::fmt::Write as _;

const PAGE_HEAD: &str = r#"<!DOCTYPE html>
<html>
  <head>
    <title>Pub/Sub</title>
  </head>
  <body>
    <div>
"#;

const PAGE_TAIL: &str = r#"      </ul>
    </div>
    <form method="post" action="/pubsub/publish">
      <textarea name="payload" placeholder="Enter message here"></textarea>
      <input type="submit">
    </form>
    <p>Note: if the application is running across multiple instances, each
      instance will have its own list of messages.</p>
  </body>
</html>
"#;

/// Heading for the message list; "ten" is spelled out for the default capacity
fn heading(capacity: usize) -> String {
    if capacity == 10 {
        "Last ten messages received by this instance:".to_string()
    } else {
        format!("Last {} messages received by this instance:", capacity)
    }
}

/// Render the page listing `messages` oldest first
pub fn render_index(messages: &[Bytes], capacity: usize) -> String {
    let mut html = String::from(PAGE_HEAD);
    let _ = writeln!(html, "      <p>{}</p>", heading(capacity));
    html.push_str("      <ul>\n");
    for message in messages {
        let text = String::from_utf8_lossy(message);
        let _ = writeln!(
            html,
            "          <li>{}</li>",
            html_escape::encode_text(&text)
        );
    }
    html.push_str(PAGE_TAIL);
    html
}
