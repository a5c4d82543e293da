use std::fmt::Write;

use crate::catalog::{Gender, VoiceCatalog, DEFAULT_VOICE};

const HEAD: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>Kokoro TTS</title>
</head>
<body>
<h1>Kokoro Text-to-Speech</h1>
<form id="tts-form">
<label for="language">Language</label>
<select id="language">
"#;

const TAIL: &str = r#"<label for="text">Text</label>
<textarea id="text" rows="6" cols="60"></textarea>
<button type="submit" id="generate">Generate Speech</button>
</form>
<div id="status" class="status"></div>
<audio id="audio-player" controls style="display:none"></audio>
<script>
const language = document.getElementById('language');
const voice = document.getElementById('voice');
const status = document.getElementById('status');
const player = document.getElementById('audio-player');

function filterVoices() {
  for (const group of voice.querySelectorAll('optgroup')) {
    group.hidden = group.label !== language.value;
  }
  const first = voice.querySelector(`optgroup[label="${CSS.escape(language.value)}"] option`);
  if (first && voice.selectedOptions[0]?.parentElement.label !== language.value) {
    voice.value = first.value;
  }
}
language.addEventListener('change', filterVoices);
filterVoices();

document.getElementById('tts-form').addEventListener('submit', async (event) => {
  event.preventDefault();
  status.className = 'status loading';
  status.textContent = 'Generating speech...';
  player.style.display = 'none';
  try {
    const response = await fetch('/generate', {
      method: 'POST',
      headers: {'Content-Type': 'application/json'},
      body: JSON.stringify({text: document.getElementById('text').value, voice: voice.value}),
    });
    const data = await response.json();
    if (!response.ok) {
      throw new Error(data.error || 'Request failed');
    }
    player.src = '/audio/' + data.filename.split('/').pop();
    player.style.display = 'block';
    status.className = 'status success';
    status.textContent = `Speech generated (${data.segments} segment(s))`;
  } catch (err) {
    status.className = 'status error';
    status.textContent = 'Error: ' + err.message;
  }
});
</script>
</body>
</html>
"#;

/// Render the voice picker page for `catalog`.
pub fn render_index(catalog: &VoiceCatalog) -> String {
    let mut html = String::from(HEAD);

    for language in catalog.languages() {
        let name = escape(language);
        let _ = writeln!(html, "<option value=\"{name}\">{name}</option>");
    }
    html.push_str("</select>\n<label for=\"voice\">Voice</label>\n<select id=\"voice\">\n");

    for (language, voices) in catalog.iter() {
        let _ = writeln!(html, "<optgroup label=\"{}\">", escape(language));
        for voice in voices {
            let gender = match voice.gender {
                Gender::Male => "male",
                Gender::Female => "female",
            };
            let selected = if voice.code == DEFAULT_VOICE {
                " selected"
            } else {
                ""
            };
            let _ = writeln!(
                html,
                "<option value=\"{}\"{selected}>{} ({gender})</option>",
                escape(&voice.code),
                escape(&voice.display_name),
            );
        }
        html.push_str("</optgroup>\n");
    }
    html.push_str("</select>\n");

    html.push_str(TAIL);
    html
}

fn escape(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            ch => escaped.push(ch),
        }
    }
    escaped
}
