//! Embedded portal pages.
//!
//! Two static documents, compiled in so the binary has no asset
//! directory to deploy. The index page drives the blob API with plain
//! fetch calls; the error page is also what the production error
//! rewrite serves for non-API requests.

/// Landing page: upload form plus the container listing.
pub const INDEX_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>Blob Portal</title>
<style>
  body { font-family: system-ui, sans-serif; margin: 2rem auto; max-width: 44rem; padding: 0 1rem; color: #222; }
  h1 { font-size: 1.4rem; }
  table { border-collapse: collapse; width: 100%; margin-top: 1.5rem; }
  th, td { text-align: left; padding: 0.4rem 0.6rem; border-bottom: 1px solid #ddd; }
  form { margin-top: 1rem; }
  button { cursor: pointer; }
  #error { background: #fdecea; border: 1px solid #b3261e; padding: 0.6rem; margin: 1rem 0; display: none; white-space: pre-wrap; }
</style>
</head>
<body>
<h1>Blob Portal</h1>
<p>Upload files to the configured storage container.</p>
<div id="error"></div>
<form id="upload-form">
  <input type="file" id="file" name="file" multiple>
  <button type="submit">Upload</button>
</form>
<table>
  <thead><tr><th>Name</th><th>Size</th><th>Modified</th><th></th></tr></thead>
  <tbody id="blobs"></tbody>
</table>
<script>
const errorBox = document.getElementById('error');

function showError(message) {
  errorBox.textContent = message;
  errorBox.style.display = 'block';
}

function clearError() {
  errorBox.style.display = 'none';
}

function blobPath(name) {
  return '/api/blobs/' + name.split('/').map(encodeURIComponent).join('/');
}

async function readError(response) {
  try {
    const body = await response.json();
    return body.error || response.statusText;
  } catch {
    return response.statusText;
  }
}

function formatSize(size) {
  if (size < 1024) return size + ' B';
  if (size < 1048576) return (size / 1024).toFixed(1) + ' KB';
  return (size / 1048576).toFixed(1) + ' MB';
}

async function refresh() {
  const response = await fetch('/api/blobs');
  if (!response.ok) {
    showError(await readError(response));
    return;
  }
  clearError();

  const tbody = document.getElementById('blobs');
  tbody.replaceChildren();
  for (const blob of await response.json()) {
    const row = document.createElement('tr');

    const nameCell = document.createElement('td');
    const link = document.createElement('a');
    link.href = blobPath(blob.name);
    link.textContent = blob.name;
    nameCell.append(link);

    const sizeCell = document.createElement('td');
    sizeCell.textContent = formatSize(blob.size);

    const modifiedCell = document.createElement('td');
    modifiedCell.textContent = blob.last_modified
      ? new Date(blob.last_modified).toLocaleString()
      : '';

    const actionCell = document.createElement('td');
    const remove = document.createElement('button');
    remove.textContent = 'Delete';
    remove.addEventListener('click', () => removeBlob(blob.name));
    actionCell.append(remove);

    row.append(nameCell, sizeCell, modifiedCell, actionCell);
    tbody.append(row);
  }
}

async function removeBlob(name) {
  const response = await fetch(blobPath(name), { method: 'DELETE' });
  if (!response.ok) {
    showError(await readError(response));
    return;
  }
  await refresh();
}

document.getElementById('upload-form').addEventListener('submit', async (event) => {
  event.preventDefault();
  const input = document.getElementById('file');
  if (!input.files.length) return;

  const form = new FormData();
  for (const file of input.files) {
    form.append('file', file);
  }

  const response = await fetch('/api/blobs', { method: 'POST', body: form });
  if (!response.ok) {
    showError(await readError(response));
    return;
  }
  input.value = '';
  await refresh();
});

refresh();
</script>
</body>
</html>
"#;

/// Generic error page. Shown at `/error` and substituted for server
/// error bodies outside development.
pub const ERROR_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>Error</title>
<style>
  body { font-family: system-ui, sans-serif; margin: 4rem auto; max-width: 44rem; padding: 0 1rem; color: #222; }
  h1 { font-size: 1.4rem; }
</style>
</head>
<body>
<h1>Error</h1>
<p>An error occurred while processing your request.</p>
<p><a href="/">Return to the portal</a></p>
</body>
</html>
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::error::GENERIC_ERROR;

    #[test]
    fn test_error_page_carries_the_generic_message() {
        assert!(ERROR_HTML.contains(GENERIC_ERROR));
    }

    #[test]
    fn test_index_mentions_the_portal() {
        assert!(INDEX_HTML.contains("Blob Portal"));
        assert!(INDEX_HTML.contains("/api/blobs"));
    }
}
