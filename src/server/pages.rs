// 该文件是 Tanbing （探病） 项目的一部分。
// src/server/pages.rs - HTML 页面
//
// 本文件根据 Apache 许可证第 2.0 版（以下简称“许可证”）授权使用；
// 除非遵守该许可证条款，否则您不得使用本文件。
// 您可通过以下网址获取许可证副本：
// http://www.apache.org/licenses/LICENSE-2.0
// 除非适用法律要求或书面同意，根据本许可协议分发的软件均按“原样”提供，
// 不附带任何形式的明示或暗示的保证或条件。
// 有关许可权限与限制的具体条款，请参阅本许可协议。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, Wareless Group

use std::fmt::Write;

use crate::model::Detection;

pub const INDEX_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>Plant Disease Detection</title>
<style>
body { font-family: sans-serif; max-width: 720px; margin: 2em auto; }
</style>
</head>
<body>
<h1>Plant Disease Detection</h1>
<p>Upload a leaf photo to detect diseases.</p>
<form action="/predict" method="post" enctype="multipart/form-data">
  <input type="file" name="image" accept=".jpg,.jpeg,.png">
  <button type="submit">Predict (JSON)</button>
</form>
<ul>
  <li><a href="/ui/detections">Detection list</a></li>
  <li><a href="/ui/top">Top detection</a></li>
</ul>
</body>
</html>
"#;

const PAGE_STYLE: &str = "body { font-family: sans-serif; max-width: 960px; margin: 2em auto; }\n\
  .images { display: flex; gap: 1em; }\n\
  .images figure { flex: 1; margin: 0; }\n\
  .images img { max-width: 100%; }\n\
  .banner { padding: 0.8em; border-radius: 4px; }\n\
  .success { background: #e3f6e3; color: #1b5e20; }\n\
  .error { background: #fdecea; color: #b71c1c; }";

pub const NO_DETECTION_MESSAGE: &str = "No disease detected";

/// 结果区域的呈现方式
pub enum Outcome<'a> {
  /// 列出全部检测
  List(&'a [Detection]),
  /// 只显示置信度最高的检测
  Banner(Option<&'a Detection>),
}

pub fn escape_html(text: &str) -> String {
  let mut out = String::with_capacity(text.len());
  for c in text.chars() {
    match c {
      '&' => out.push_str("&amp;"),
      '<' => out.push_str("&lt;"),
      '>' => out.push_str("&gt;"),
      '"' => out.push_str("&quot;"),
      '\'' => out.push_str("&#39;"),
      _ => out.push(c),
    }
  }
  out
}

fn page(title: &str, body: &str) -> String {
  format!(
    concat!(
      "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n",
      "<title>{title}</title>\n<style>\n{style}\n</style>\n</head>\n",
      "<body>\n<h1>{title}</h1>\n{body}</body>\n</html>\n",
    ),
    title = escape_html(title),
    style = PAGE_STYLE,
    body = body,
  )
}

fn upload_form(action: &str) -> String {
  format!(
    concat!(
      "<form action=\"{}\" method=\"post\" enctype=\"multipart/form-data\">\n",
      "  <input type=\"file\" name=\"image\" accept=\".jpg,.jpeg,.png\">\n",
      "  <button type=\"submit\">Detect</button>\n</form>\n",
    ),
    escape_html(action)
  )
}

/// 上传页面，可附带一条错误横幅
pub fn render_form(title: &str, action: &str, error: Option<&str>) -> String {
  let mut body = String::new();
  if let Some(message) = error {
    let _ = writeln!(body, "<p class=\"banner error\">{}</p>", escape_html(message));
  }
  body.push_str(&upload_form(action));
  page(title, &body)
}

/// 结果页面：原图、标注图与检测结果
pub fn render_result(
  title: &str,
  action: &str,
  original_url: &str,
  annotated_url: &str,
  outcome: Outcome<'_>,
) -> String {
  let mut body = upload_form(action);
  let _ = write!(
    body,
    concat!(
      "<div class=\"images\">\n",
      "  <figure><img src=\"{}\" alt=\"Original image\">",
      "<figcaption>Original image</figcaption></figure>\n",
      "  <figure><img src=\"{}\" alt=\"Detected result\">",
      "<figcaption>Detected result</figcaption></figure>\n",
      "</div>\n",
    ),
    escape_html(original_url),
    escape_html(annotated_url)
  );

  match outcome {
    Outcome::List(detections) if detections.is_empty() => {
      let _ = writeln!(body, "<p class=\"banner error\">{}</p>", NO_DETECTION_MESSAGE);
    }
    Outcome::List(detections) => {
      body.push_str("<h2>Detections</h2>\n<ul>\n");
      for d in detections {
        let _ = writeln!(
          body,
          "  <li>{}: {:.1}%</li>",
          escape_html(&d.label),
          d.confidence * 100.0
        );
      }
      body.push_str("</ul>\n");
    }
    Outcome::Banner(Some(top)) => {
      let _ = writeln!(
        body,
        "<p class=\"banner success\">Detected: {} (confidence {:.2})</p>",
        escape_html(&top.label),
        top.confidence
      );
    }
    Outcome::Banner(None) => {
      let _ = writeln!(body, "<p class=\"banner error\">{}</p>", NO_DETECTION_MESSAGE);
    }
  }

  page(title, &body)
}
