//! Plain-text bean rendering
//!
//! Each bean becomes a `Name:` line followed by one `key: value` line per
//! property and a blank separator line:
//!
//! ```text
//! Name: beanwatch_vhost:Host=example.com,Port=80,Type=info
//! ServerName: example.com:80
//! ServerAliases: www.example.com
//! ListenAddresses: 0.0.0.0:80
//!
//! ```

use std::fmt::Write;

use beanwatch_common::Bean;

/// Content type of [`render_text`] output.
pub const TEXT_CONTENT_TYPE: &str = "text/plain; charset=utf-8";

/// Appends one bean to `out`.
pub fn write_bean(out: &mut String, bean: &Bean) {
    // Writing into a String cannot fail.
    let _ = writeln!(out, "Name: {}", bean.objectname());
    for property in bean.properties() {
        let _ = writeln!(out, "{}: {}", property.key(), property.value());
    }
    out.push('\n');
}

/// Renders every bean in order. No beans render as an empty body.
pub fn render_text(beans: &[Bean]) -> String {
    let mut out = String::new();
    for bean in beans {
        write_bean(&mut out, bean);
    }
    out
}
