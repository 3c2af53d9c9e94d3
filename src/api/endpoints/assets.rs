//! Embedded web shell served without authentication: the landing page,
//! PWA manifest, service worker, and icon. No files on disk, nothing to
//! install.

/// A static asset with its MIME type.
#[derive(Debug, Clone, Copy)]
pub struct StaticAsset {
    pub content_type: &'static str,
    pub body: &'static str,
}

pub const INDEX: StaticAsset = StaticAsset {
    content_type: "text/html; charset=utf-8",
    body: INDEX_HTML,
};

pub const MANIFEST: StaticAsset = StaticAsset {
    content_type: "application/manifest+json",
    body: MANIFEST_JSON,
};

pub const SERVICE_WORKER: StaticAsset = StaticAsset {
    content_type: "application/javascript",
    body: SW_JS,
};

pub const ICON: StaticAsset = StaticAsset {
    content_type: "image/svg+xml",
    body: ICON_SVG,
};

const INDEX_HTML: &str = r##"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1, viewport-fit=cover">
<meta name="theme-color" content="#12141a">
<link rel="manifest" href="/manifest.json">
<link rel="icon" href="/icon.svg" type="image/svg+xml">
<title>Tether</title>
<style>
:root { color-scheme: dark; }
* { box-sizing: border-box; margin: 0; }
body {
  font-family: -apple-system, system-ui, sans-serif;
  background: #12141a; color: #e7e9ee;
  min-height: 100vh; padding: 1.25rem;
  display: flex; flex-direction: column; gap: 1rem;
}
h1 { font-size: 1.2rem; font-weight: 600; }
input, textarea, button {
  font: inherit; border-radius: 10px; border: 1px solid #2a2e3a;
  background: #1b1e27; color: inherit; padding: 0.7rem 0.9rem; width: 100%;
}
textarea { min-height: 7rem; resize: vertical; }
button {
  background: #3b6ef5; border: none; font-weight: 600; cursor: pointer;
}
button:active { opacity: 0.85; }
#log { font-size: 0.85rem; color: #9aa1b2; white-space: pre-wrap; }
</style>
</head>
<body>
<h1>Tether</h1>
<input id="token" type="password" placeholder="Access token" autocomplete="off">
<textarea id="prompt" placeholder="What should the desktop do?"></textarea>
<button id="send">Send task</button>
<div id="log"></div>
<script>
const log = (m) => document.getElementById('log').textContent = m;
const saved = localStorage.getItem('tether-token');
if (saved) document.getElementById('token').value = saved;
document.getElementById('send').addEventListener('click', async () => {
  const token = document.getElementById('token').value.trim();
  const prompt = document.getElementById('prompt').value.trim();
  if (!prompt) { log('Nothing to send.'); return; }
  localStorage.setItem('tether-token', token);
  try {
    const res = await fetch('/task', {
      method: 'POST',
      headers: {
        'Content-Type': 'application/json',
        'Authorization': 'Bearer ' + token,
      },
      body: JSON.stringify({ prompt }),
    });
    const data = await res.json();
    if (data.ok) {
      log('Queued as ' + data.task_id);
      document.getElementById('prompt').value = '';
    } else {
      log('Rejected: ' + data.error);
    }
  } catch (e) {
    log('Network error: ' + e.message);
  }
});
if ('serviceWorker' in navigator) navigator.serviceWorker.register('/sw.js');
</script>
</body>
</html>
"##;

const MANIFEST_JSON: &str = r##"{
  "name": "Tether",
  "short_name": "Tether",
  "start_url": "/",
  "display": "standalone",
  "background_color": "#12141a",
  "theme_color": "#12141a",
  "icons": [
    { "src": "/icon.svg", "sizes": "any", "type": "image/svg+xml" }
  ]
}
"##;

const SW_JS: &str = r#"const CACHE = 'tether-v1';
const SHELL = ['/', '/manifest.json', '/icon.svg'];

self.addEventListener('install', (event) => {
  event.waitUntil(caches.open(CACHE).then((c) => c.addAll(SHELL)));
  self.skipWaiting();
});

self.addEventListener('activate', (event) => {
  event.waitUntil(
    caches.keys().then((keys) =>
      Promise.all(keys.filter((k) => k !== CACHE).map((k) => caches.delete(k)))
    )
  );
});

self.addEventListener('fetch', (event) => {
  if (event.request.method !== 'GET') return;
  event.respondWith(
    fetch(event.request).catch(() => caches.match(event.request))
  );
});
"#;

const ICON_SVG: &str = r##"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 64 64">
<rect width="64" height="64" rx="14" fill="#12141a"/>
<circle cx="20" cy="32" r="7" fill="none" stroke="#3b6ef5" stroke-width="4"/>
<circle cx="44" cy="32" r="7" fill="none" stroke="#3b6ef5" stroke-width="4"/>
<line x1="27" y1="32" x2="37" y2="32" stroke="#3b6ef5" stroke-width="4"/>
</svg>
"##;
