//! Scripted browser procedures.
//!
//! The automation backend runs a small exported JS function against a fresh
//! page. The scripts here are fixed templates with named placeholders;
//! credentials are escaped before substitution, never concatenated raw.

/// Escape a value for embedding inside a single-quoted JS string literal.
///
/// Backslashes, both quote kinds and all ASCII control characters are
/// escaped, so a hostile credential cannot break out of the literal.
pub fn escape_js(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 => out.push_str(&format!("\\u{:04x}", c as u32)),
            c => out.push(c),
        }
    }
    out
}

/// Parameters shared by all portal scripts.
pub struct ScriptParams<'a> {
    /// School URL without a trailing slash.
    pub school_url: &'a str,
    pub username: &'a str,
    pub password: &'a str,
    pub student_id: Option<&'a str>,
}

const LOGIN_PREAMBLE: &str = r#"
        await page.goto('__SCHOOL_URL__/HomeAccess/Account/LogOn', {
            waitUntil: 'networkidle2',
            timeout: 45000
        });

        await new Promise(resolve => setTimeout(resolve, 1000));

        await page.type('input[name="LogOnDetails.UserName"]', '__USERNAME__');
        await page.type('input[name="LogOnDetails.Password"]', '__PASSWORD__');

        await Promise.all([
            page.waitForNavigation({ waitUntil: 'networkidle2', timeout: 45000 }),
            page.click('button#login')
        ]);

        await new Promise(resolve => setTimeout(resolve, 2000));
"#;

// Selecting the student is best-effort: if the picker or the radio button for
// this student is absent, the account has a single student and the portal
// skipped the picker.
const STUDENT_PICKER: &str = r#"
        const pickerResponse = await page.goto('__SCHOOL_URL__/HomeAccess/Frame/StudentPicker', {
            waitUntil: 'networkidle2',
            timeout: 30000
        }).catch(() => null);

        if (pickerResponse && pickerResponse.ok()) {
            const hasStudentInput = await page.$('input[name="studentId"][value="__STUDENT_ID__"]');

            if (hasStudentInput) {
                await page.click('input[name="studentId"][value="__STUDENT_ID__"]');

                await Promise.all([
                    page.waitForNavigation({ waitUntil: 'networkidle2', timeout: 30000 }),
                    page.evaluate(() => {
                        const form = document.querySelector('form');
                        if (form) form.submit();
                    })
                ]);

                await new Promise(resolve => setTimeout(resolve, 2000));
            }
        }
"#;

const GOTO_ASSIGNMENTS: &str = r#"
        await page.goto('__SCHOOL_URL__/HomeAccess/Content/Student/Assignments.aspx', {
            waitUntil: 'networkidle2',
            timeout: 45000
        });
"#;

const LOGIN_CAPTURE: &str = r#"
        await page.waitForSelector('span[id*="lblOverallAverage"]', { timeout: 10000 });

        const html = await page.content();
        const url = page.url();
        const cookies = await page.cookies();

        let selectedStudentId = null;
        try {
            await page.goto('__SCHOOL_URL__/HomeAccess/Classes/Classwork', {
                waitUntil: 'networkidle2',
                timeout: 15000
            });
            const banner = await page.$('.sg-banner');
            if (banner) {
                selectedStudentId = await page.$eval('.sg-banner', el => el.getAttribute('data-student-id'));
            }
        } catch (e) {
            // The verification banner is opportunistic only.
        }

        return { url, cookies, html, selectedStudentId };
"#;

const QUARTER_CAPTURE: &str = r#"
        await page.waitForSelector('#plnMain_ddlReportCardRuns', { timeout: 15000 });

        await page.select('#plnMain_ddlReportCardRuns', '__QUARTER_VALUE__');

        await Promise.all([
            page.waitForNavigation({ waitUntil: 'networkidle2', timeout: 45000 }),
            page.click('#plnMain_btnRefreshView')
        ]);

        await new Promise(resolve => setTimeout(resolve, 2000));

        try {
            await page.waitForSelector('span[id*="lblOverallAverage"]', { timeout: 5000 });
        } catch (e) {
            // The quarter may have no graded work yet; an empty view is fine.
        }

        const html = await page.content();
        const url = page.url();
        const cookies = await page.cookies();
        return { url, cookies, html };
"#;

fn wrap_function(body: &str) -> String {
    format!(
        "export default async ({{ page }}) => {{\n    try {{\n{}\n    }} catch (error) {{\n        return {{ error: error.message }};\n    }}\n}};\n",
        body
    )
}

fn fill(template: &str, params: &ScriptParams<'_>) -> String {
    template
        .replace("__SCHOOL_URL__", &escape_js(params.school_url))
        .replace("__USERNAME__", &escape_js(params.username))
        .replace("__PASSWORD__", &escape_js(params.password))
}

fn login_body(params: &ScriptParams<'_>) -> String {
    let mut body = fill(LOGIN_PREAMBLE, params);
    if let Some(student_id) = params.student_id {
        body.push_str(
            &fill(STUDENT_PICKER, params).replace("__STUDENT_ID__", &escape_js(student_id)),
        );
    }
    body.push_str(&fill(GOTO_ASSIGNMENTS, params));
    body
}

/// The full login procedure: authenticate, select the student, land on the
/// assignments view, capture html/url/cookies and the verification banner.
pub fn login_script(params: &ScriptParams<'_>) -> String {
    let mut body = login_body(params);
    body.push_str(&fill(LOGIN_CAPTURE, params));
    wrap_function(&body)
}

/// Like [`login_script`] but additionally selects a report-card run in the
/// dropdown and triggers the refresh post-back before capturing.
pub fn quarter_script(params: &ScriptParams<'_>, quarter_value: &str) -> String {
    let mut body = login_body(params);
    body.push_str(&QUARTER_CAPTURE.replace("__QUARTER_VALUE__", &escape_js(quarter_value)));
    wrap_function(&body)
}
