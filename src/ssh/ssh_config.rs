// ~/.ssh/config 解析
//
// 支持:
// - Host 块（多个模式、* / ? 通配符、!否定）
// - 第一个 Host 之前的全局指令
// - "Key Value" 与 "Key=Value" 两种写法，双引号包裹的值
// - Match 块整体跳过，Include 忽略

use tracing::debug;

/// 解析错误
#[derive(Debug, thiserror::Error)]
#[error("line {line}: {message}")]
pub struct SshConfigParseError {
    pub line: usize,
    pub keyword: String,
    pub value: String,
    pub message: String,
}

/// 块的作用范围
#[derive(Debug, Clone)]
enum Scope {
    /// 文件开头、第一个 Host 之前
    Global,
    /// Host 模式列表
    Host(Vec<HostPattern>),
    /// Match 块，不参与匹配
    Match,
}

#[derive(Debug, Clone)]
struct HostPattern {
    pattern: String,
    negated: bool,
}

#[derive(Debug, Clone)]
struct Block {
    scope: Scope,
    /// (小写关键字, 值)
    directives: Vec<(String, String)>,
}

impl Block {
    fn matches(&self, alias: &str) -> bool {
        match &self.scope {
            Scope::Global => true,
            Scope::Match => false,
            Scope::Host(patterns) => {
                let alias = alias.to_lowercase();
                let mut matched = false;
                for p in patterns {
                    if glob_match(&p.pattern, &alias) {
                        if p.negated {
                            return false;
                        }
                        matched = true;
                    }
                }
                matched
            }
        }
    }
}

/// 解析后的 SSH 配置
#[derive(Debug, Clone, Default)]
pub struct SshConfigFile {
    blocks: Vec<Block>,
}

impl SshConfigFile {
    /// 解析配置内容
    pub fn parse(content: &str) -> Result<Self, SshConfigParseError> {
        let mut blocks = vec![Block {
            scope: Scope::Global,
            directives: Vec::new(),
        }];

        for (idx, raw) in content.lines().enumerate() {
            let line_no = idx + 1;
            let line = raw.trim();

            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let (keyword, rest) = split_keyword(line);
            let rest = strip_comment(rest);
            let value = unquote(rest).ok_or_else(|| SshConfigParseError {
                line: line_no,
                keyword: keyword.to_string(),
                value: rest.to_string(),
                message: "unterminated quote".to_string(),
            })?;
            let keyword = keyword.to_lowercase();

            match keyword.as_str() {
                "host" => {
                    let patterns = value
                        .split_whitespace()
                        .map(|p| match p.strip_prefix('!') {
                            Some(stripped) => HostPattern {
                                pattern: stripped.to_lowercase(),
                                negated: true,
                            },
                            None => HostPattern {
                                pattern: p.to_lowercase(),
                                negated: false,
                            },
                        })
                        .collect::<Vec<_>>();
                    if patterns.is_empty() {
                        return Err(SshConfigParseError {
                            line: line_no,
                            keyword,
                            value,
                            message: "Host directive requires at least one pattern".to_string(),
                        });
                    }
                    blocks.push(Block {
                        scope: Scope::Host(patterns),
                        directives: Vec::new(),
                    });
                }
                "match" => {
                    debug!("ssh config line {}: skipping Match block", line_no);
                    blocks.push(Block {
                        scope: Scope::Match,
                        directives: Vec::new(),
                    });
                }
                "include" => {
                    debug!("ssh config line {}: Include {} ignored", line_no, value);
                }
                _ => {
                    if let Some(block) = blocks.last_mut() {
                        block.directives.push((keyword, value));
                    }
                }
            }
        }

        Ok(Self { blocks })
    }

    /// 查询 alias 下某个关键字的值
    ///
    /// 按文件顺序遍历所有匹配块，第一个出现的值生效（与 ssh 客户端一致）。
    /// 关键字大小写不敏感。
    pub fn get(&self, alias: &str, keyword: &str) -> Option<&str> {
        let keyword = keyword.to_lowercase();
        self.blocks
            .iter()
            .filter(|b| b.matches(alias))
            .flat_map(|b| b.directives.iter())
            .find(|(k, _)| *k == keyword)
            .map(|(_, v)| v.as_str())
    }

    /// 是否有 Host 块明确匹配该 alias（全局块不算）
    pub fn has_host(&self, alias: &str) -> bool {
        self.blocks
            .iter()
            .any(|b| matches!(b.scope, Scope::Host(_)) && b.matches(alias))
    }
}

/// 拆分关键字与剩余部分
fn split_keyword(line: &str) -> (&str, &str) {
    let end = line
        .find(|c: char| c.is_whitespace() || c == '=')
        .unwrap_or(line.len());
    let keyword = &line[..end];
    let rest = line[end..].trim_start();
    let rest = rest.strip_prefix('=').unwrap_or(rest).trim();
    (keyword, rest)
}

/// 去掉行尾注释：引号外、空白之后的 #
fn strip_comment(rest: &str) -> &str {
    let mut in_quotes = false;
    let mut after_space = true;
    for (i, c) in rest.char_indices() {
        match c {
            '"' => in_quotes = !in_quotes,
            '#' if !in_quotes && after_space => return rest[..i].trim_end(),
            _ => {}
        }
        after_space = c.is_whitespace();
    }
    rest
}

/// 去掉双引号；引号未闭合返回 None
fn unquote(value: &str) -> Option<String> {
    if !value.contains('"') {
        return Some(value.to_string());
    }

    let mut out = String::with_capacity(value.len());
    let mut in_quotes = false;
    for c in value.chars() {
        if c == '"' {
            in_quotes = !in_quotes;
        } else {
            out.push(c);
        }
    }

    if in_quotes {
        None
    } else {
        Some(out)
    }
}

/// 通配符匹配：* 匹配任意串，? 匹配单个字符
pub(crate) fn glob_match(pattern: &str, text: &str) -> bool {
    let p: Vec<char> = pattern.chars().collect();
    let t: Vec<char> = text.chars().collect();

    let (mut pi, mut ti) = (0, 0);
    let mut star: Option<usize> = None;
    let mut mark = 0;

    while ti < t.len() {
        if pi < p.len() && p[pi] == '*' {
            star = Some(pi);
            mark = ti;
            pi += 1;
        } else if pi < p.len() && (p[pi] == '?' || p[pi] == t[ti]) {
            pi += 1;
            ti += 1;
        } else if let Some(s) = star {
            pi = s + 1;
            mark += 1;
            ti = mark;
        } else {
            return false;
        }
    }

    while pi < p.len() && p[pi] == '*' {
        pi += 1;
    }
    pi == p.len()
}
