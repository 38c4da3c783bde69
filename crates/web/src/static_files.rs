//! Static file serving

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};

use crate::error::{ApiError, ApiResult};

/// Static file handler
pub struct StaticFiles {}

impl StaticFiles {
    pub fn new() -> Self {
        Self {}
    }

    /// Serve an embedded asset
    pub async fn serve(&self, path: &str) -> Response {
        let content_type = guess_content_type(path);

        match path {
            "main.js" => serve_embedded(MAIN_JS, content_type),
            "config.js" => serve_embedded(CONFIG_JS, content_type),
            "logs.js" => serve_embedded(LOGS_JS, content_type),
            "firmware.js" => serve_embedded(FIRMWARE_JS, content_type),
            "style.css" => serve_embedded(STYLE_CSS, content_type),
            _ => (StatusCode::NOT_FOUND, "File not found").into_response(),
        }
    }

    /// Panel landing page
    pub fn index(&self) -> Response {
        serve_embedded(INDEX_HTML, "text/html; charset=utf-8")
    }

    pub fn logs_page(&self) -> Response {
        serve_embedded(LOGS_HTML, "text/html; charset=utf-8")
    }

    pub fn firmware_page(&self) -> Response {
        serve_embedded(FIRMWARE_HTML, "text/html; charset=utf-8")
    }
}

impl Default for StaticFiles {
    fn default() -> Self {
        Self::new()
    }
}

fn guess_content_type(path: &str) -> &'static str {
    if path.ends_with(".js") {
        "application/javascript"
    } else if path.ends_with(".css") {
        "text/css"
    } else if path.ends_with(".html") {
        "text/html"
    } else {
        "application/octet-stream"
    }
}

fn serve_embedded(content: &'static str, content_type: &'static str) -> Response {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, content_type)],
        content,
    )
        .into_response()
}

/// Validate a single path component taken from a URL.
///
/// Names are joined onto a store directory, so separators and the `.`/`..`
/// components are refused. Dots elsewhere in a name are fine.
pub fn checked_name<'a>(kind: &str, name: &'a str) -> ApiResult<&'a str> {
    let invalid = name.is_empty()
        || name == "."
        || name == ".."
        || name.contains(&['/', '\\', '\0'][..]);
    if invalid {
        return Err(ApiError::BadRequest(format!("invalid {} name: {:?}", kind, name)));
    }
    Ok(name)
}

/// Download response for file contents.
pub fn attachment(filename: &str, body: Vec<u8>) -> Response {
    let mime = mime_guess::from_path(filename).first_or_octet_stream();
    let disposition = format!("attachment; filename=\"{}\"", filename.replace('"', ""));
    let mut res = (StatusCode::OK, [(header::CONTENT_TYPE, mime.as_ref())], body).into_response();
    if let Ok(value) = HeaderValue::from_str(&disposition) {
        res.headers_mut().insert(header::CONTENT_DISPOSITION, value);
    }
    res
}

const INDEX_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>AutoTest</title>
<link rel="stylesheet" href="/static/style.css">
</head>
<body>
<nav><a href="/">Runs</a> | <a href="/config">Configuration</a> | <a href="/logs">Logs</a> | <a href="/firmware">Firmware</a></nav>
<h1>Intercom test runs</h1>
<div class="run-buttons">
  <button type="button" data-suite="acceptance">Acceptance</button>
  <button type="button" data-suite="regression">Regression</button>
  <button type="button" data-suite="firmware">Firmware upload</button>
  <button type="button" id="stopBtn">Stop</button>
  <button type="button" id="resultBtn">Last result</button>
</div>
<progress id="progressBar" max="100" value="0"></progress>
<span id="timer">00:00</span>
<pre id="output"></pre>
<script src="/static/main.js"></script>
</body>
</html>
"#;

const MAIN_JS: &str = r#"
document.addEventListener('DOMContentLoaded', () => {
  const output = document.getElementById('output');
  const progressBar = document.getElementById('progressBar');
  const timer = document.getElementById('timer');
  let ticker = null;

  const startTimer = () => {
    const started = Date.now();
    stopTimer();
    ticker = setInterval(() => {
      const secs = Math.floor((Date.now() - started) / 1000);
      const mm = String(Math.floor(secs / 60)).padStart(2, '0');
      const ss = String(secs % 60).padStart(2, '0');
      timer.textContent = `${mm}:${ss}`;
    }, 1000);
  };
  const stopTimer = () => {
    if (ticker) clearInterval(ticker);
    ticker = null;
  };

  document.querySelectorAll('button[data-suite]').forEach(btn => {
    btn.addEventListener('click', () => {
      progressBar.value = 0;
      output.textContent = '';
      timer.textContent = '00:00';
      startTimer();

      const source = new EventSource(`/runs/${btn.dataset.suite}/progress`);
      source.onmessage = e => {
        const msg = JSON.parse(e.data);
        if (msg.progress !== undefined) progressBar.value = msg.progress;
        if (msg.done) {
          output.textContent = msg.result;
          source.close();
          stopTimer();
        }
      };
      source.onerror = () => {
        output.textContent = `Connection error (${btn.dataset.suite}).`;
        source.close();
        stopTimer();
      };
    });
  });

  document.getElementById('stopBtn').addEventListener('click', () => {
    fetch('/api/run/stop', { method: 'POST' })
      .then(res => res.json())
      .then(data => {
        output.textContent = data.status === 'stopped'
          ? `Stopped. ${data.result || ''}`
          : 'No run in progress.';
        stopTimer();
      })
      .catch(() => { output.textContent = 'Stop request failed.'; });
  });

  document.getElementById('resultBtn').addEventListener('click', () => {
    progressBar.value = 0;
    output.textContent = '';
    fetch('/result')
      .then(res => res.json())
      .then(data => { output.textContent = data.result || 'No result yet.'; })
      .catch(() => { output.textContent = 'Failed to fetch the result.'; });
  });
});
"#;

const CONFIG_JS: &str = r#"
document.addEventListener('DOMContentLoaded', () => {
  const editor = document.getElementById('editor');
  const form = document.getElementById('config-form');
  const status = document.getElementById('editor-status');
  if (!editor || !form) return;

  const base = `/api/editor/${editor.dataset.session}`;
  let queue = Promise.resolve();

  // Requests run one at a time; a failed one must not block the rest.
  const call = (method, path, body) => {
    const request = queue.then(() => fetch(base + path, {
      method,
      headers: { 'Content-Type': 'application/json' },
      body: body === undefined ? undefined : JSON.stringify(body),
    }).then(res => res.json().then(data => {
      if (!res.ok) throw new Error(data.error || res.statusText);
      status.textContent = '';
      return data;
    })));
    queue = request.catch(() => {});
    return request.catch(err => { status.textContent = err.message; });
  };

  const redraw = data => {
    if (data && data.html !== undefined) editor.innerHTML = data.html;
  };

  editor.addEventListener('click', evt => {
    const btn = evt.target.closest('button[data-action]');
    if (!btn || btn.disabled) return;
    const g = btn.dataset.group;
    const p = btn.dataset.pair;
    switch (btn.dataset.action) {
      case 'add-group':
        call('POST', '/groups', {}).then(redraw);
        break;
      case 'duplicate-group': {
        const last = editor.querySelectorAll('fieldset.config-group').length - 1;
        call('POST', '/groups', { template: last }).then(redraw);
        break;
      }
      case 'remove-group':
        call('DELETE', `/groups/${g}`).then(redraw);
        break;
      case 'add-pair':
        call('POST', `/groups/${g}/pairs`, {}).then(redraw);
        break;
      case 'remove-pair':
        call('DELETE', `/groups/${g}/pairs/${p}`).then(redraw);
        break;
    }
  });

  editor.addEventListener('change', evt => {
    const input = evt.target;
    if (!input.dataset || !input.dataset.field) return;
    call('PUT', `/groups/${input.dataset.group}/pairs/${input.dataset.pair}`,
      { [input.dataset.field]: input.value });
  });

  form.addEventListener('submit', evt => {
    evt.preventDefault();
    call('POST', '/submit').then(data => {
      if (data && data.saved) window.location.reload();
    });
  });
});
"#;

const LOGS_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>AutoTest - Logs</title>
<link rel="stylesheet" href="/static/style.css">
</head>
<body>
<nav><a href="/">Runs</a> | <a href="/config">Configuration</a> | <a href="/logs">Logs</a> | <a href="/firmware">Firmware</a></nav>
<h1>Run logs</h1>
<a href="/api/logs/download_all">Download all (zip)</a>
<div class="split">
  <ul id="logList"></ul>
  <div id="logView"></div>
</div>
<script src="/static/logs.js"></script>
</body>
</html>
"#;

const LOGS_JS: &str = r#"
document.addEventListener('DOMContentLoaded', () => {
  const list = document.getElementById('logList');
  const view = document.getElementById('logView');
  const enc = encodeURIComponent;

  const show = name => {
    fetch(`/api/logs/${enc(name)}`)
      .then(res => res.json())
      .then(data => {
        view.innerHTML = '';
        if (data.error) {
          view.textContent = data.error;
        } else if (data.type === 'image') {
          const img = document.createElement('img');
          img.src = data.url;
          img.alt = data.filename;
          view.appendChild(img);
        } else {
          const pre = document.createElement('pre');
          pre.textContent = data.content;
          view.appendChild(pre);
        }
      });
  };

  const load = () => {
    fetch('/api/logs')
      .then(res => res.json())
      .then(data => {
        list.innerHTML = '';
        data.files.forEach(name => {
          const li = document.createElement('li');
          const open = document.createElement('a');
          open.href = '#';
          open.textContent = name;
          open.addEventListener('click', evt => { evt.preventDefault(); show(name); });
          const download = document.createElement('a');
          download.href = `/api/logs/download/${enc(name)}`;
          download.textContent = 'download';
          const remove = document.createElement('button');
          remove.type = 'button';
          remove.textContent = 'delete';
          remove.addEventListener('click', () => {
            fetch(`/api/logs/${enc(name)}`, { method: 'DELETE' }).then(load);
          });
          li.append(open, ' ', download, ' ', remove);
          list.appendChild(li);
        });
      });
  };

  load();
});
"#;

const FIRMWARE_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>AutoTest - Firmware</title>
<link rel="stylesheet" href="/static/style.css">
</head>
<body>
<nav><a href="/">Runs</a> | <a href="/config">Configuration</a> | <a href="/logs">Logs</a> | <a href="/firmware">Firmware</a></nav>
<h1>Firmware store</h1>
<form id="versionForm">
  <input type="text" id="versionName" placeholder="Version">
  <button type="submit">Create version</button>
</form>
<select id="versionSelect"></select>
<form id="uploadForm">
  <input type="file" id="uploadFile">
  <button type="submit">Upload</button>
</form>
<ul id="fileList"></ul>
<p id="firmwareStatus"></p>
<script src="/static/firmware.js"></script>
</body>
</html>
"#;

const FIRMWARE_JS: &str = r#"
document.addEventListener('DOMContentLoaded', () => {
  const select = document.getElementById('versionSelect');
  const files = document.getElementById('fileList');
  const status = document.getElementById('firmwareStatus');
  const enc = encodeURIComponent;

  const report = res => res.json().then(data => {
    status.textContent = res.ok ? '' : (data.error || res.statusText);
    return data;
  });

  const loadFiles = () => {
    files.innerHTML = '';
    const version = select.value;
    if (!version) return;
    fetch(`/api/firmware/${enc(version)}`).then(report).then(data => {
      (data.files || []).forEach(name => {
        const li = document.createElement('li');
        const link = document.createElement('a');
        link.href = `/firmware/${enc(version)}/${enc(name)}`;
        link.textContent = name;
        const remove = document.createElement('button');
        remove.type = 'button';
        remove.textContent = 'delete';
        remove.addEventListener('click', () => {
          fetch(`/api/firmware/${enc(version)}/delete/${enc(name)}`, { method: 'DELETE' })
            .then(report).then(loadFiles);
        });
        li.append(link, ' ', remove);
        files.appendChild(li);
      });
    });
  };

  const loadVersions = selected => {
    fetch('/api/firmware/versions').then(report).then(data => {
      select.innerHTML = '';
      (data.versions || []).forEach(v => select.add(new Option(v, v, false, v === selected)));
      loadFiles();
    });
  };

  document.getElementById('versionForm').addEventListener('submit', evt => {
    evt.preventDefault();
    const version = document.getElementById('versionName').value.trim();
    fetch('/api/firmware/versions/create', {
      method: 'POST',
      headers: { 'Content-Type': 'application/json' },
      body: JSON.stringify({ version }),
    }).then(report).then(data => loadVersions(data.version));
  });

  document.getElementById('uploadForm').addEventListener('submit', evt => {
    evt.preventDefault();
    const input = document.getElementById('uploadFile');
    if (!select.value || !input.files.length) return;
    const body = new FormData();
    body.append('file', input.files[0]);
    fetch(`/api/firmware/${enc(select.value)}/upload`, { method: 'POST', body })
      .then(report).then(loadFiles);
  });

  select.addEventListener('change', loadFiles);
  loadVersions();
});
"#;

const STYLE_CSS: &str = r#"
body { font-family: sans-serif; margin: 1.5em; }
nav { margin-bottom: 1em; }
progress { width: 60%; }
#output { background: #f4f4f4; padding: 1em; min-height: 6em; white-space: pre-wrap; }
.config-group { margin-bottom: 1em; }
.group-header { display: flex; justify-content: space-between; align-items: center; }
.config-row { display: flex; gap: 0.5em; margin: 0.25em 0; }
.config-row input { flex: 1; }
button[disabled] { display: none; }
.split { display: flex; gap: 2em; }
#logView img { max-width: 100%; }
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_editor_queue_survives_failed_request() {
        // the shared chain must be the recovered promise, never the raw request
        assert!(CONFIG_JS.contains("queue = request.catch(() => {});"));
        assert!(!CONFIG_JS.contains("queue = queue.then"));
    }

    #[test]
    fn test_checked_name() {
        assert!(checked_name("log", "logacceptance_20250101_120000.txt").is_ok());
        assert!(checked_name("log", "run..txt").is_ok());
        assert!(checked_name("log", "..").is_err());
        assert!(checked_name("log", ".").is_err());
        assert!(checked_name("log", "").is_err());
        assert!(checked_name("log", "../config.txt").is_err());
        assert!(checked_name("log", "a\\b").is_err());
    }

    #[test]
    fn test_attachment_headers() {
        let res = attachment("screen.png", vec![1, 2, 3]);
        assert_eq!(res.headers().get(header::CONTENT_TYPE).unwrap(), "image/png");
        assert_eq!(
            res.headers().get(header::CONTENT_DISPOSITION).unwrap(),
            "attachment; filename=\"screen.png\""
        );
    }

    #[tokio::test]
    async fn test_serves_known_assets() {
        let files = StaticFiles::new();
        let res = files.serve("config.js").await;
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(
            res.headers().get(header::CONTENT_TYPE).unwrap(),
            "application/javascript"
        );
        assert_eq!(files.serve("missing.js").await.status(), StatusCode::NOT_FOUND);
    }
}
