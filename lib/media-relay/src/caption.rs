use crate::relay_structs::Post;

pub fn escape_html(text: &str) -> String {
	let mut escaped = String::with_capacity(text.len());
	for c in text.chars() {
		match c {
			'&' => escaped.push_str("&amp;"),
			'<' => escaped.push_str("&lt;"),
			'>' => escaped.push_str("&gt;"),
			'"' => escaped.push_str("&quot;"),
			_ => escaped.push(c),
		}
	}
	escaped
}

pub fn render(label: &str, post: &Post, source_url: &str) -> String {
	let author = &post.author;
	let mut caption = if author.display_name.is_empty() {
		"unknown".to_string()
	} else if let Some(profile_url) = &author.profile_url {
		format!(
			"<a href=\"{}\">{}</a>",
			escape_html(profile_url),
			escape_html(&author.display_name)
		)
	} else {
		escape_html(&author.display_name)
	};
	if !post.text_html.is_empty() {
		caption.push_str(":\n\n");
		caption.push_str(&post.text_html);
	}
	if !post.tags.is_empty() {
		let tags: Vec<String> = post
			.tags
			.iter()
			.map(|tag| format!("#{}", escape_html(&tag.replace('-', ""))))
			.collect();
		caption.push_str("\n\n");
		caption.push_str(&tags.join(" "));
	}
	caption.push_str(&format!(
		"\n\nvia <a href=\"{}\">{label}</a>",
		escape_html(source_url)
	));
	caption
}
